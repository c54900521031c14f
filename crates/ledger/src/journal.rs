//! Journal records - hash-chained envelopes around ledger events

use serde::{Deserialize, Serialize};

use crate::event::LedgerEvent;
use crate::hash::calculate_record_hash;

/// `prev_hash` of the first record in a journal
pub const GENESIS_HASH: &str = "GENESIS";

/// One committed event in the append-only journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Position in the journal, starting at 1
    pub sequence: u64,
    pub prev_hash: String,
    /// SHA-256 over every other field
    pub hash: String,
    pub correlation_id: String,
    pub event: LedgerEvent,
}

impl JournalRecord {
    /// Build a sealed record following `prev_hash`
    pub fn seal(
        sequence: u64,
        prev_hash: impl Into<String>,
        correlation_id: impl Into<String>,
        event: LedgerEvent,
    ) -> Self {
        let mut record = Self {
            sequence,
            prev_hash: prev_hash.into(),
            hash: String::new(),
            correlation_id: correlation_id.into(),
            event,
        };
        record.hash = calculate_record_hash(&record);
        record
    }
}
