//! Event store errors

use lendbank_ledger::ChainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid journal file {file} line {line}: {reason}")]
    InvalidRecord {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Replay failed at seq {sequence}: {reason}")]
    Replay { sequence: u64, reason: String },

    #[error("Journal chain verification failed: {0}")]
    Chain(#[from] ChainError),
}
