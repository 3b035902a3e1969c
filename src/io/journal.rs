//! Trip journal - appends every trip notification to a JSONL file
//!
//! One JSON object per line: `{"ts":..,"event":"trip_completed",...}`.

use crate::domain::types::{epoch_ms, TripType, Zone};
use crate::io::notifier::{TripNotification, TripObserver};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Serialize)]
struct JournalEntry<'a> {
    ts: u64,
    #[serde(flatten)]
    notification: &'a TripNotification,
}

/// JSONL journal writer
pub struct Journal {
    file_path: PathBuf,
}

impl Journal {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), "journal_initialized");
        Self { file_path }
    }

    /// Append a notification. Returns true if written.
    pub fn write(&self, notification: &TripNotification) -> bool {
        let entry = JournalEntry { ts: epoch_ms(), notification };
        let result = serde_json::to_string(&entry)
            .map_err(std::io::Error::from)
            .and_then(|line| self.append_line(&line));

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(event = %notification.as_str(), error = %e, "journal_write_failed");
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path.display(), bytes = %line.len(), "journal_written");

        Ok(())
    }
}

impl TripObserver for Journal {
    fn on_journey_started(&self, origin: Zone) {
        self.write(&TripNotification::JourneyStarted { origin });
    }

    fn on_trip_completed(&self, trip_type: TripType, record_id: u64) {
        self.write(&TripNotification::TripCompleted { trip_type, record_id });
    }

    fn on_skipped(&self, trip_type: TripType) {
        self.write(&TripNotification::SkippedNotWalking { trip_type });
    }

    fn on_undone(&self, record_id: u64) {
        self.write(&TripNotification::AutoRecordUndone { record_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_notification() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("trips.jsonl");
        let journal = Journal::new(&file_path);

        assert!(journal.write(&TripNotification::TripCompleted {
            trip_type: TripType::HomeToUniversity,
            record_id: 120_000,
        }));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["event"], "trip_completed");
        assert_eq!(parsed["trip_type"], "home_to_uni");
        assert_eq!(parsed["record_id"], 120_000);
        assert!(parsed["ts"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_observer_appends_lines() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("trips.jsonl");
        let journal = Journal::new(&file_path);

        journal.on_journey_started(Zone::University);
        journal.on_skipped(TripType::UniversityToHome);
        journal.on_undone(5);

        let content = fs::read_to_string(&file_path).unwrap();
        let events: Vec<String> = content
            .lines()
            .map(|line| {
                let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
                parsed["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events, vec!["journey_started", "skipped_not_walking", "auto_record_undone"]);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested_path = dir.path().join("nested").join("dir").join("trips.jsonl");
        let journal = Journal::new(&nested_path);

        assert!(journal.write(&TripNotification::AutoRecordUndone { record_id: 1 }));
        assert!(nested_path.exists());
    }

    #[test]
    fn test_unwritable_path_reports_failure() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for appending
        let journal = Journal::new(dir.path());
        assert!(!journal.write(&TripNotification::AutoRecordUndone { record_id: 1 }));
    }
}
