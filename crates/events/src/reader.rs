//! JSONL journal reader - loads records for replay and audit

use crate::error::EventError;
use lendbank_ledger::{verify_chain, JournalRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Reader over every journal file in a directory
pub struct EventReader {
    files: Vec<PathBuf>,
}

impl EventReader {
    /// Collect the journal files of a directory; a missing directory is an
    /// empty journal
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                if file_path.extension().is_some_and(|ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        files.sort();

        Ok(Self { files })
    }

    /// All records, ordered by sequence.
    ///
    /// Files are named after event dates, which need not follow sequence
    /// order when the clock moved backwards across midnight.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, EventError> {
        let mut records = Vec::new();

        for file_path in &self.files {
            let file = File::open(file_path)?;
            let reader = BufReader::new(file);

            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: JournalRecord =
                    serde_json::from_str(&line).map_err(|e| EventError::InvalidRecord {
                        file: file_path.display().to_string(),
                        line: index + 1,
                        reason: e.to_string(),
                    })?;
                records.push(record);
            }
        }

        records.sort_by_key(|record| record.sequence);
        Ok(records)
    }

    /// Check the hash chain; returns the number of verified records
    pub fn verify(&self) -> Result<usize, EventError> {
        let records = self.read_all()?;
        verify_chain(&records)?;
        Ok(records.len())
    }
}
