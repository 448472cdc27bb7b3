#[macro_use]
mod macros;
mod journal;
mod metadata;
mod value;

pub use journal::{Journal, JournalEntry, MemoryPositionStore, RecordingSink};
pub use metadata::FakeMetadataSource;
pub use value::{IntoBinlogValue, NoneValue, NullValue};
