mod cache;
mod info;
mod table_name;

pub use cache::{TableCache, HEALTH_CHECK_SCHEMA, HEALTH_CHECK_TABLE, NEGATIVE_CACHE_WINDOW};
pub use info::MetadataSource;
pub use table_name::{quote_identifier, table_key};

use std::sync::Arc;

pub trait TableSchema {
    fn schema_name(&self) -> &str;

    fn table_name(&self) -> &str;

    fn column_position(&self, column: impl AsRef<str>) -> Option<usize>;
}

/// Column type class derived from the declared SQL type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Number,
    MediumInt,
    Float,
    Decimal,
    Enum,
    Set,
    String,
    Datetime,
    Timestamp,
    Date,
    Time,
    Bit,
    Json,
    Binary,
    Point,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub declared_type: String,
    pub column_type: ColumnType,
    pub is_unsigned: bool,
    /// Labels of enum and set columns in declaration order.
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableMetadata {
    schema: String,
    table: String,
    columns: Vec<Column>,
    indexes: Vec<Index>,
}

const DECLARED_TYPE_PREFIXES: &[(&str, ColumnType)] = &[
    ("float", ColumnType::Float),
    ("double", ColumnType::Float),
    ("real", ColumnType::Float),
    ("decimal", ColumnType::Decimal),
    ("numeric", ColumnType::Decimal),
    ("enum", ColumnType::Enum),
    ("set", ColumnType::Set),
    ("datetime", ColumnType::Datetime),
    ("timestamp", ColumnType::Timestamp),
    ("date", ColumnType::Date),
    ("time", ColumnType::Time),
    ("bit", ColumnType::Bit),
    ("json", ColumnType::Json),
    ("mediumint", ColumnType::MediumInt),
    ("tinyint", ColumnType::Number),
    ("smallint", ColumnType::Number),
    ("int", ColumnType::Number),
    ("bigint", ColumnType::Number),
    ("year", ColumnType::Number),
    ("bool", ColumnType::Number),
    ("binary", ColumnType::Binary),
    ("varbinary", ColumnType::Binary),
    ("point", ColumnType::Point),
    ("geometry", ColumnType::Point),
];

impl ColumnType {
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_lowercase();

        DECLARED_TYPE_PREFIXES
            .iter()
            .find(|(prefix, _)| declared.starts_with(prefix))
            .map(|(_, column_type)| *column_type)
            .unwrap_or(ColumnType::String)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ColumnType::Float)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Number | ColumnType::MediumInt | ColumnType::Bit
        )
    }
}

impl Column {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let column_type = ColumnType::from_declared(&declared_type);
        let values = match column_type {
            ColumnType::Enum | ColumnType::Set => parse_labels(&declared_type),
            _ => Vec::new(),
        };

        Self {
            name: name.into(),
            is_unsigned: declared_type.to_ascii_lowercase().contains("unsigned"),
            declared_type,
            column_type,
            values,
        }
    }
}

/// Extracts labels from `enum('a','b')` and `set('x','y')` declarations.
fn parse_labels(declared: &str) -> Vec<String> {
    let (start, end) = match (declared.find('('), declared.rfind(')')) {
        (Some(start), Some(end)) if start < end => (start + 1, end),
        _ => return Vec::new(),
    };

    let body = declared[start..end].trim();
    let body = body.strip_prefix('\'').unwrap_or(body);
    let body = body.strip_suffix('\'').unwrap_or(body);

    if body.is_empty() {
        return Vec::new();
    }

    body.split("','")
        .map(|label| label.replace("''", "'"))
        .collect()
}

impl TableMetadata {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<Column>,
        indexes: Vec<Index>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns,
            indexes,
        }
    }

    /// Builds metadata from column names and type classes, declared type is the class name.
    pub fn with_columns<'a>(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = (&'a str, ColumnType)>,
    ) -> Self {
        let columns = columns
            .into_iter()
            .map(|(name, column_type)| Column {
                name: name.to_owned(),
                declared_type: format!("{column_type:?}").to_ascii_lowercase(),
                column_type,
                is_unsigned: false,
                values: Vec::new(),
            })
            .collect();

        Self::new(schema, table, columns, Vec::new())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|index| index.name == "PRIMARY")
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl TableSchema for TableMetadata {
    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn column_position(&self, column: impl AsRef<str>) -> Option<usize> {
        self.columns
            .iter()
            .position(|candidate| candidate.name == column.as_ref())
    }
}
