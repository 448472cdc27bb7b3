mod value;

pub use value::{FieldValue, ValueOptions};

use crate::error::Error;
use crate::record::AssembledRecord;
use crate::replication::event::EventKind;
use crate::replication::BinaryRow;
use crate::schema::{TableMetadata, TableSchema};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Capture rules of one database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DatabaseRule {
    pub database: String,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    #[serde(default)]
    pub tables: Vec<TableRule>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TableRule {
    pub name: String,
    #[serde(default)]
    pub measurement: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub exclude_events: Vec<EventKind>,
}

/// Resolved rule of a single captured table.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterRule {
    measurement: String,
    tags: Vec<String>,
    fields: Vec<String>,
    exclude_events: Vec<EventKind>,
}

/// Column positions projected into a record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnSelection {
    pub tags: Vec<usize>,
    pub fields: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct TableFilter {
    databases: Vec<DatabaseRule>,
    measurement_prefix: Option<String>,
}

impl DatabaseRule {
    pub fn validate(&self) -> Result<(), Error> {
        for table in &self.tables {
            let fields: HashSet<&str> = table.fields.iter().map(String::as_str).collect();

            if let Some(column) = table.tags.iter().find(|tag| fields.contains(tag.as_str())) {
                return Err(Error::Config(format!(
                    "column {column} of {}.{} is configured as both tag and field",
                    self.database, table.name
                )));
            }
        }

        Ok(())
    }
}

impl FilterRule {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            exclude_events: Vec::new(),
        }
    }

    pub fn with_tags<T: Into<String>>(self, tags: impl IntoIterator<Item = T>) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_fields<T: Into<String>>(self, fields: impl IntoIterator<Item = T>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_excluded_events(self, exclude_events: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            exclude_events: exclude_events.into_iter().collect(),
            ..self
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn excludes(&self, kind: EventKind) -> bool {
        self.exclude_events.contains(&kind)
    }

    /// Without an explicit field list every column is a field and tags are ignored.
    pub fn classify_columns(&self, table: &TableMetadata) -> ColumnSelection {
        if self.fields.is_empty() {
            return ColumnSelection {
                tags: Vec::new(),
                fields: (0..table.columns().len()).collect(),
            };
        }

        let resolve = |names: &[String]| -> Vec<usize> {
            names
                .iter()
                .filter_map(|name| table.column_position(name))
                .collect()
        };

        ColumnSelection {
            tags: resolve(&self.tags),
            fields: resolve(&self.fields),
        }
    }

    pub fn assemble(
        &self,
        table: &TableMetadata,
        row: &BinaryRow,
        timestamp: u32,
        options: &ValueOptions,
    ) -> AssembledRecord {
        let selection = self.classify_columns(table);

        let tags = selection
            .tags
            .iter()
            .filter_map(|index| Some((*index, table.column(*index)?)))
            .map(|(index, column)| {
                let value = options.coerce(column, row.get(index));
                (column.name.clone(), value.to_string())
            })
            .collect::<BTreeMap<_, _>>();

        let fields = selection
            .fields
            .iter()
            .filter_map(|index| Some((*index, table.column(*index)?)))
            .map(|(index, column)| (column.name.clone(), options.coerce(column, row.get(index))))
            .collect::<BTreeMap<_, _>>();

        AssembledRecord {
            measurement: self.measurement.clone(),
            tags,
            fields,
            timestamp,
        }
    }
}

impl TableFilter {
    pub fn new(databases: Vec<DatabaseRule>) -> Self {
        Self {
            databases,
            measurement_prefix: None,
        }
    }

    pub fn with_measurement_prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            measurement_prefix: Some(prefix.into()),
            ..self
        }
    }

    pub fn databases(&self) -> &[DatabaseRule] {
        &self.databases
    }

    /// Rule for a captured table, `None` when the table is not configured for capture.
    pub fn match_table(&self, schema: &str, table: &str) -> Option<Arc<FilterRule>> {
        let database = self
            .databases
            .iter()
            .find(|database| database.database == schema)?;

        if database.exclude_tables.iter().any(|name| name == table) {
            return None;
        }

        let rule = match database.tables.is_empty() {
            true => FilterRule::new(self.measurement(table)),
            false => {
                let rule = database.tables.iter().find(|rule| rule.name == table)?;

                FilterRule::new(self.measurement(rule.measurement.as_deref().unwrap_or(table)))
                    .with_tags(rule.tags.iter().cloned())
                    .with_fields(rule.fields.iter().cloned())
                    .with_excluded_events(rule.exclude_events.iter().copied())
            }
        };

        Some(Arc::new(rule))
    }

    fn measurement(&self, name: &str) -> String {
        match &self.measurement_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_owned(),
        }
    }
}
