//! JSONL journal store - append-only writer

use crate::error::EventError;
use lendbank_ledger::JournalRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The day file currently open for appends
struct Segment {
    date: String,
    writer: BufWriter<File>,
}

/// Append-only JSONL journal, one file per event date
pub struct EventStore {
    base_path: PathBuf,
    segment: Option<Segment>,
}

impl EventStore {
    /// Open (creating if needed) a journal directory
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, EventError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            segment: None,
        })
    }

    /// Append a record and sync it to disk before returning.
    ///
    /// Records land in the file named after their event's date. After a
    /// failed write the day file is released unflushed and reopened by the
    /// next append.
    pub fn append(&mut self, record: &JournalRecord) -> Result<(), EventError> {
        let date = record.event.at.format("%Y-%m-%d").to_string();
        let line = serde_json::to_string(record)?;

        if let Err(e) = self.write_line(&date, &line) {
            if let Some(segment) = self.segment.take() {
                // discard whatever is still buffered
                let _ = segment.writer.into_parts();
            }
            return Err(e);
        }

        debug!(sequence = record.sequence, file = %date, "journal record appended");
        Ok(())
    }

    fn write_line(&mut self, date: &str, line: &str) -> Result<(), EventError> {
        if !self.segment.as_ref().is_some_and(|s| s.date == date) {
            self.open_segment(date)?;
        }
        if let Some(segment) = self.segment.as_mut() {
            writeln!(segment.writer, "{line}")?;
            segment.writer.flush()?;
            segment.writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn open_segment(&mut self, date: &str) -> Result<(), EventError> {
        self.close()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(date))?;
        self.segment = Some(Segment {
            date: date.to_string(),
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    /// Path of the journal file for `date` (`YYYY-MM-DD`)
    pub fn file_path(&self, date: &str) -> PathBuf {
        self.base_path.join(format!("{date}.jsonl"))
    }

    /// Flush and release the open day file
    pub fn close(&mut self) -> Result<(), EventError> {
        if let Some(mut segment) = self.segment.take() {
            segment.writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::record_at;
    use lendbank_ledger::GENESIS_HASH;
    use tempfile::TempDir;

    #[test]
    fn test_append_rotates_by_event_date() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::new(dir.path()).unwrap();

        let r1 = record_at(1, GENESIS_HASH, 1_700_000_000);
        let r2 = record_at(2, &r1.hash, 1_700_000_000 + 86_400);
        store.append(&r1).unwrap();
        store.append(&r2).unwrap();

        let first = fs::read_to_string(store.file_path("2023-11-14")).unwrap();
        let second = fs::read_to_string(store.file_path("2023-11-15")).unwrap();
        assert_eq!(first.lines().count(), 1);
        assert_eq!(second.lines().count(), 1);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let r1 = record_at(1, GENESIS_HASH, 1_700_000_000);
        let r2 = record_at(2, &r1.hash, 1_700_000_100);

        {
            let mut store = EventStore::new(dir.path()).unwrap();
            store.append(&r1).unwrap();
        }
        let mut store = EventStore::new(dir.path()).unwrap();
        store.append(&r2).unwrap();

        let content = fs::read_to_string(store.file_path("2023-11-14")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_failed_open_is_retried() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::new(dir.path()).unwrap();
        let r1 = record_at(1, GENESIS_HASH, 1_700_000_000);
        store.append(&r1).unwrap();

        // a directory squatting on the next day's file name
        let blocked = store.file_path("2023-11-15");
        fs::create_dir(&blocked).unwrap();
        let r2 = record_at(2, &r1.hash, 1_700_000_000 + 86_400);
        assert!(matches!(store.append(&r2), Err(EventError::Io(_))));
        assert!(store.segment.is_none());

        fs::remove_dir(&blocked).unwrap();
        store.append(&r2).unwrap();
        let content = fs::read_to_string(&blocked).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
