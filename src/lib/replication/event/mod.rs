use crate::error::Error;
use crate::replication::gtid::Gtid;
use crate::replication::BinaryRow;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

mod meta;

pub use meta::{BinlogPosition, EventHeader};

/// Single changed row of a rows event.
#[derive(Clone, PartialEq, Debug)]
pub enum RowEvent {
    InsertRow(BinaryRow),
    /// After image, the before image is not kept.
    UpdateRow(BinaryRow),
    DeleteRow(BinaryRow),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, PartialEq, Debug)]
pub struct RowsEvent {
    pub schema: String,
    pub table: String,
    pub rows: Vec<RowEvent>,
}

/// Replication events the dispatcher acts on, already resolved against table maps.
#[derive(Clone, PartialEq, Debug)]
pub enum BinlogEvent {
    Rotate { next_file: String, position: u64 },
    Rows(RowsEvent),
    Xid,
    Gtid(Gtid),
    Query { schema: String, query: String },
}

impl RowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RowEvent::InsertRow(_) => EventKind::Insert,
            RowEvent::UpdateRow(_) => EventKind::Update,
            RowEvent::DeleteRow(_) => EventKind::Delete,
        }
    }

    /// Row image published downstream.
    pub fn projected_row(&self) -> &BinaryRow {
        match self {
            RowEvent::InsertRow(row) | RowEvent::UpdateRow(row) | RowEvent::DeleteRow(row) => row,
        }
    }
}

impl RowsEvent {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, rows: Vec<RowEvent>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            rows,
        }
    }
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Insert => "insert",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(EventKind::Insert),
            "update" => Ok(EventKind::Update),
            "delete" => Ok(EventKind::Delete),
            other => Err(Error::Config(format!(
                "unknown event kind \"{other}\", only insert, update and delete are allowed"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(D::Error::custom)
    }
}
