//! Hash chain utilities for journal integrity

use sha2::{Digest, Sha256};

use crate::journal::{JournalRecord, GENESIS_HASH};

/// Calculate SHA256 hash of a record (excluding the hash field itself)
pub fn calculate_record_hash(record: &JournalRecord) -> String {
    let mut hasher = Sha256::new();

    hasher.update(record.sequence.to_le_bytes());
    hasher.update(record.prev_hash.as_bytes());
    hasher.update(record.correlation_id.as_bytes());
    hasher.update(record.event.at.to_rfc3339().as_bytes());
    hasher.update(format!("{:?}", record.event.op).as_bytes());

    hex::encode(hasher.finalize())
}

/// Verify hash chain integrity
pub fn verify_chain(records: &[JournalRecord]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();

    for (i, record) in records.iter().enumerate() {
        if record.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                sequence: record.sequence,
                expected: prev_hash,
                actual: record.prev_hash.clone(),
            });
        }

        let calculated = calculate_record_hash(record);
        if record.hash != calculated {
            return Err(ChainError::InvalidHash {
                sequence: record.sequence,
                expected: calculated,
                actual: record.hash.clone(),
            });
        }

        let expected_sequence = i as u64 + 1;
        if record.sequence != expected_sequence {
            return Err(ChainError::InvalidSequence {
                expected: expected_sequence,
                actual: record.sequence,
            });
        }

        prev_hash = record.hash.clone();
    }

    Ok(())
}

/// Errors in hash chain verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    BrokenLink {
        sequence: u64,
        expected: String,
        actual: String,
    },
    InvalidHash {
        sequence: u64,
        expected: String,
        actual: String,
    },
    InvalidSequence {
        expected: u64,
        actual: u64,
    },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::BrokenLink {
                sequence,
                expected,
                actual,
            } => write!(
                f,
                "Broken link at seq {}: expected prev_hash '{}', got '{}'",
                sequence, expected, actual
            ),
            ChainError::InvalidHash {
                sequence,
                expected,
                actual,
            } => write!(
                f,
                "Tampered record at seq {}: expected hash '{}', got '{}'",
                sequence, expected, actual
            ),
            ChainError::InvalidSequence { expected, actual } => {
                write!(f, "Invalid sequence: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ChainError {}
