pub mod ddl;
mod decoder;
mod dispatcher;
pub mod event;
pub mod gtid;
mod row;
mod session;

#[cfg(test)]
pub(crate) mod test_fixture;

pub use decoder::{row_events, EventDecoder};
pub use dispatcher::{Dispatcher, Transition};
pub use row::BinaryRow;
pub use session::{Session, SessionOutcome, SessionSettings};

/// Inline capacity of row buffers, wider tables spill to the heap.
pub const BUFFER_STACK_SIZE: usize = 32;
