#[cfg(any(feature = "test_util", test))]
#[macro_use]
pub mod test_util;

pub mod app;
pub mod database;
pub mod error;
pub mod filter;
pub mod output;
pub mod position;
pub mod record;
pub mod replication;
pub mod schema;
