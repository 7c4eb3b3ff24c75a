//! Event store and checkpoint adapters: in-memory and SQLite implementations
//! of `seedloop-ports::EventStore`, plus the checkpoint ring of spec §4.2.

pub mod checkpoint;
pub mod memory;
pub mod sqlite;

pub use checkpoint::{CheckpointError, CheckpointStore, Recovered, MAX_ROLLBACK_DEPTH};
pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;
