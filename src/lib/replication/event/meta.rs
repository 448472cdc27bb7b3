use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub struct BinlogPosition {
    file: Arc<str>,
    position: u32,
}

impl Default for BinlogPosition {
    fn default() -> Self {
        Self {
            file: Arc::from(""),
            position: 0,
        }
    }
}

impl Clone for BinlogPosition {
    fn clone(&self) -> Self {
        Self {
            file: Arc::clone(&self.file),
            position: self.position,
        }
    }
}

impl BinlogPosition {
    pub fn new(file: impl Into<Arc<str>>, position: u32) -> Self {
        Self {
            file: file.into(),
            position,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}

/// Common header of every binlog event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventHeader {
    timestamp: u32,
    log_position: u32,
}

impl EventHeader {
    pub fn new(timestamp: u32, log_position: u32) -> Self {
        Self {
            timestamp,
            log_position,
        }
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Position of the next event; zero for artificial events.
    pub fn log_position(&self) -> u32 {
        self.log_position
    }
}
