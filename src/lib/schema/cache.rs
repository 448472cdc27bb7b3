use crate::error::Error;
use crate::filter::{FilterRule, TableFilter};
use crate::schema::{table_key, Column, Index, MetadataSource, TableMetadata};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Failed metadata fetches are not retried within this window.
pub const NEGATIVE_CACHE_WINDOW: Duration = Duration::from_secs(10);

/// Pseudo table written by managed MySQL health checks, its metadata is not queryable.
pub const HEALTH_CHECK_SCHEMA: &str = "mysql";
pub const HEALTH_CHECK_TABLE: &str = "ha_health_check";

/// Lazily populated table metadata of one source.
pub struct TableCache<S> {
    source: S,
    filter: TableFilter,
    discard_no_meta: bool,
    tables: RwLock<HashMap<String, Arc<TableMetadata>>>,
    failures: RwLock<HashMap<String, Instant>>,
}

fn health_check_table() -> TableMetadata {
    TableMetadata::new(
        HEALTH_CHECK_SCHEMA,
        HEALTH_CHECK_TABLE,
        vec![Column::new("id", "bigint(20)"), Column::new("type", "char(1)")],
        vec![Index {
            name: "PRIMARY".into(),
            columns: vec!["id".into()],
        }],
    )
}

impl<S> TableCache<S>
where
    S: MetadataSource,
{
    pub fn new(source: S, filter: TableFilter) -> Self {
        Self {
            source,
            filter,
            discard_no_meta: false,
            tables: RwLock::default(),
            failures: RwLock::default(),
        }
    }

    /// Failed fetches are remembered and reported as missing metadata instead of the raw error.
    pub fn with_discard_no_meta(self, discard_no_meta: bool) -> Self {
        Self {
            discard_no_meta,
            ..self
        }
    }

    pub fn filter(&self) -> &TableFilter {
        &self.filter
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn get_table(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<(Arc<TableMetadata>, Arc<FilterRule>), Error> {
        let rule = self
            .filter
            .match_table(schema, table)
            .ok_or_else(|| Error::ExcludedTable(schema.into(), table.into()))?;

        let key = table_key(schema, table);

        if let Some(metadata) = self.cached(&key) {
            return Ok((metadata, rule));
        }

        if self.failed_recently(&key) {
            return Err(Error::MissingTableMeta(schema.into(), table.into()));
        }

        if schema.eq_ignore_ascii_case(HEALTH_CHECK_SCHEMA)
            && table.eq_ignore_ascii_case(HEALTH_CHECK_TABLE)
        {
            return Ok((self.store(key, health_check_table()), rule));
        }

        match self.source.fetch_table(schema, table).await {
            Ok(metadata) => {
                debug!(schema, table, "Fetched table metadata");
                Ok((self.store(key, metadata), rule))
            }
            Err(error) => {
                if let Ok(false) = self.source.table_exists(schema, table).await {
                    return Err(Error::TableNotExist(schema.into(), table.into()));
                }

                if !self.discard_no_meta {
                    return Err(error);
                }

                warn!(schema, table, error = %error, "Cannot fetch table metadata, discarding its row events");

                self.failures
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, Instant::now());

                Err(Error::MissingTableMeta(schema.into(), table.into()))
            }
        }
    }

    /// Drops cached and failed lookups of a table.
    pub fn clear_table_cache(&self, schema: &str, table: &str) {
        let key = table_key(schema, table);

        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    pub fn is_cached(&self, schema: &str, table: &str) -> bool {
        self.cached(&table_key(schema, table)).is_some()
    }

    fn cached(&self, key: &str) -> Option<Arc<TableMetadata>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn failed_recently(&self, key: &str) -> bool {
        self.failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|failed_at| failed_at.elapsed() < NEGATIVE_CACHE_WINDOW)
    }

    fn store(&self, key: String, metadata: TableMetadata) -> Arc<TableMetadata> {
        let metadata = metadata.into_shared();

        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&metadata));

        metadata
    }
}
