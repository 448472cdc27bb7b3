use crate::database::{row_value, Database};
use crate::error::Error;
use crate::schema::{quote_identifier, Column, Index, TableMetadata};
use mysql_async::Params;
use std::sync::Arc;

/// Server side table introspection used to populate the table cache.
pub trait MetadataSource {
    async fn fetch_table(&self, schema: &str, table: &str) -> Result<TableMetadata, Error>;

    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, Error>;
}

impl<T> MetadataSource for Arc<T>
where
    T: MetadataSource,
{
    async fn fetch_table(&self, schema: &str, table: &str) -> Result<TableMetadata, Error> {
        self.as_ref().fetch_table(schema, table).await
    }

    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, Error> {
        self.as_ref().table_exists(schema, table).await
    }
}

impl MetadataSource for Database {
    async fn fetch_table(&self, schema: &str, table: &str) -> Result<TableMetadata, Error> {
        let name = format!("{}.{}", quote_identifier(schema), quote_identifier(table));

        let columns = self
            .execute(&format!("SHOW FULL COLUMNS FROM {name}"), Params::Empty)
            .await?;

        let columns = columns_from_definitions(
            columns
                .iter()
                .filter_map(|row| Some((row_value(row, 0)?, row_value(row, 1)?))),
        );

        if columns.is_empty() {
            return Err(Error::MissingTableMeta(schema.into(), table.into()));
        }

        let indexes = self
            .execute(&format!("SHOW INDEX FROM {name}"), Params::Empty)
            .await?;

        let indexes = indexes_from_definitions(indexes.iter().filter_map(|row| {
            Some((row_value(row, 2)?, row_value(row, 3)?, row_value(row, 4)?))
        }));

        Ok(TableMetadata::new(schema, table, columns, indexes))
    }

    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, Error> {
        let rows = self
            .execute(
                "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
                Params::Positional(vec![schema.into(), table.into()]),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row_value::<u64>(row, 0))
            .unwrap_or(0)
            > 0)
    }
}

/// Builds columns from `(Field, Type)` pairs of `SHOW FULL COLUMNS`.
pub(crate) fn columns_from_definitions(
    source: impl Iterator<Item = (String, String)>,
) -> Vec<Column> {
    source
        .map(|(name, declared_type)| Column::new(name, declared_type))
        .collect()
}

/// Groups `(Key_name, Seq_in_index, Column_name)` rows of `SHOW INDEX` into indexes.
pub(crate) fn indexes_from_definitions(
    source: impl Iterator<Item = (String, u32, String)>,
) -> Vec<Index> {
    let mut indexes: Vec<(Index, Vec<(u32, String)>)> = Vec::new();

    for (key_name, sequence, column) in source {
        match indexes.iter_mut().find(|(index, _)| index.name == key_name) {
            Some((_, columns)) => columns.push((sequence, column)),
            None => indexes.push((
                Index {
                    name: key_name,
                    columns: Vec::new(),
                },
                vec![(sequence, column)],
            )),
        }
    }

    indexes
        .into_iter()
        .map(|(mut index, mut columns)| {
            columns.sort_by_key(|(sequence, _)| *sequence);
            index.columns = columns.into_iter().map(|(_, column)| column).collect();
            index
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn builds_columns_in_declaration_order() {
        let columns = columns_from_definitions(
            vec![
                ("id".to_string(), "bigint(20) unsigned".to_string()),
                ("state".to_string(), "enum('on','off')".to_string()),
            ]
            .into_iter(),
        );

        assert_eq!(
            columns
                .iter()
                .map(|column| (column.name.as_str(), column.column_type, column.is_unsigned))
                .collect::<Vec<_>>(),
            vec![
                ("id", ColumnType::Number, true),
                ("state", ColumnType::Enum, false)
            ]
        );
        assert_eq!(columns[1].values, vec!["on", "off"]);
    }

    #[test]
    fn groups_index_columns_by_key_name_and_sequence() {
        let indexes = indexes_from_definitions(
            vec![
                ("PRIMARY".to_string(), 1, "id".to_string()),
                ("store_entity".to_string(), 2, "entity_id".to_string()),
                ("store_entity".to_string(), 1, "store_id".to_string()),
            ]
            .into_iter(),
        );

        assert_eq!(
            indexes,
            vec![
                Index {
                    name: "PRIMARY".into(),
                    columns: vec!["id".into()]
                },
                Index {
                    name: "store_entity".into(),
                    columns: vec!["store_id".into(), "entity_id".into()]
                }
            ]
        );
    }
}
