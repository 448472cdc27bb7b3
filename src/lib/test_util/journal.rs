use crate::error::Error;
use crate::position::{MasterPosition, PositionStore};
use crate::record::{AssembledRecord, RecordSink};
use crate::replication::event::BinlogPosition;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    Record(AssembledRecord),
    Flushed,
    Saved(BinlogPosition),
}

/// Shared log of sink and position store calls in the order they happened.
#[derive(Clone, Debug, Default)]
pub struct Journal(Arc<Mutex<Vec<JournalEntry>>>);

impl Journal {
    fn push(&self, entry: JournalEntry) {
        self.0.lock().unwrap().push(entry)
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    journal: Journal,
    position: Mutex<Option<MasterPosition>>,
}

impl MemoryPositionStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            position: Mutex::default(),
        }
    }

    pub fn with_position(self, position: MasterPosition) -> Self {
        Self {
            position: Mutex::new(Some(position)),
            ..self
        }
    }

    pub fn saved(&self) -> Vec<BinlogPosition> {
        self.journal
            .entries()
            .into_iter()
            .filter_map(|entry| match entry {
                JournalEntry::Saved(position) => Some(position),
                _ => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<MasterPosition> {
        self.position.lock().unwrap().clone()
    }
}

impl PositionStore for MemoryPositionStore {
    async fn load(&self) -> Result<Option<MasterPosition>, Error> {
        Ok(self.last())
    }

    async fn save(&self, position: &MasterPosition) -> Result<(), Error> {
        self.journal
            .push(JournalEntry::Saved(position.binlog.clone()));
        *self.position.lock().unwrap() = Some(position.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    journal: Journal,
}

impl RecordingSink {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn records(&self) -> Vec<AssembledRecord> {
        self.journal
            .entries()
            .into_iter()
            .filter_map(|entry| match entry {
                JournalEntry::Record(record) => Some(record),
                _ => None,
            })
            .collect()
    }
}

impl RecordSink for RecordingSink {
    async fn send(&self, record: AssembledRecord) -> Result<(), Error> {
        self.journal.push(JournalEntry::Record(record));
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        self.journal.push(JournalEntry::Flushed);
        Ok(())
    }
}
