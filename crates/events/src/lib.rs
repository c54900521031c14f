//! Lendbank Events - JSONL journal store
//!
//! Committed ledger events are persisted as hash-chained journal records,
//! one JSON object per line, in one file per day. The journal is the source
//! of truth: bank and position state is rebuilt from it on startup.

pub mod error;
pub mod reader;
pub mod store;

pub use error::EventError;
pub use reader::EventReader;
pub use store::EventStore;
