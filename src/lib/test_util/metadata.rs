use crate::error::Error;
use crate::schema::{table_key, Column, MetadataSource, TableMetadata};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::Mutex;

/// In-memory table definitions counting every fetch.
#[derive(Default)]
pub struct FakeMetadataSource {
    tables: HashMap<String, TableMetadata>,
    failing_fetch: bool,
    fetches: Mutex<HashMap<String, usize>>,
}

impl FakeMetadataSource {
    pub fn with_table(mut self, schema: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(name, declared_type)| Column::new(*name, *declared_type))
            .collect();

        self.tables.insert(
            table_key(schema, table),
            TableMetadata::new(schema, table, columns, Vec::new()),
        );
        self
    }

    /// Every fetch fails with a connection error while existence checks still succeed.
    pub fn failing_fetch(self) -> Self {
        Self {
            failing_fetch: true,
            ..self
        }
    }

    pub fn fetches(&self, schema: &str, table: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(&table_key(schema, table))
            .copied()
            .unwrap_or(0)
    }
}

impl MetadataSource for FakeMetadataSource {
    async fn fetch_table(&self, schema: &str, table: &str) -> Result<TableMetadata, Error> {
        let key = table_key(schema, table);
        *self.fetches.lock().unwrap().entry(key.clone()).or_default() += 1;

        if self.failing_fetch {
            return Err(Error::Io(ErrorKind::ConnectionReset.into()));
        }

        self.tables
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::Io(ErrorKind::NotFound.into()))
    }

    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool, Error> {
        Ok(self.tables.contains_key(&table_key(schema, table)))
    }
}
