use mysql_async::{DriverError, Error as MySQLError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    MySQLError(#[from] MySQLError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("Table {0}.{1} is not configured for capture")]
    ExcludedTable(String, String),
    #[error("Table {0}.{1} does not exist")]
    TableNotExist(String, String),
    #[error("Table {0}.{1} has no available metadata")]
    MissingTableMeta(String, String),
    #[error("Binlog format must be ROW, server reports {0:?}")]
    BinlogFormat(String),
    #[error("Binlog row image must be FULL, server reports {0:?}")]
    BinlogRowImage(String),
    #[error("Binlog position is not available")]
    BinlogPositionMissing,
    #[error("No binlog event received within {0:?}")]
    ReadTimeout(Duration),
    #[error("Binlog stream was closed by server")]
    StreamClosed,
    #[error("Rows event references unknown table id {0}")]
    UnknownTableId(u64),
    #[error("Invalid GTID set {0:?}")]
    InvalidGtidSet(String),
    #[error("Cannot parse DDL statement {0:?}")]
    DdlParse(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Cannot write output")]
    OutputError,
    #[error("Record writer stopped unexpectedly")]
    Synchronization,
}

impl Error {
    /// Row events failing with one of these are skipped, the stream continues.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Error::ExcludedTable(..) | Error::TableNotExist(..) | Error::MissingTableMeta(..)
        )
    }

    pub fn is_bad_connection(&self) -> bool {
        matches!(
            self,
            Error::MySQLError(MySQLError::Io(_))
                | Error::MySQLError(MySQLError::Driver(DriverError::ConnectionClosed))
        )
    }
}
