use crate::error::Error;
use crate::filter::FieldValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Measurement point assembled from a single captured row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssembledRecord {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: u32,
}

/// Consumer of assembled records.
pub trait RecordSink {
    async fn send(&self, record: AssembledRecord) -> Result<(), Error>;

    /// Called after a forced checkpoint, records buffered so far should reach their destination.
    async fn flush(&self) -> Result<(), Error>;
}

impl<T> RecordSink for Arc<T>
where
    T: RecordSink,
{
    async fn send(&self, record: AssembledRecord) -> Result<(), Error> {
        self.as_ref().send(record).await
    }

    async fn flush(&self) -> Result<(), Error> {
        self.as_ref().flush().await
    }
}
