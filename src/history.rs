//! Persistent record of the moves made during a run.
//!
//! Each run that moves at least one file writes a JSON log into the root it
//! organized. The log is what `undo` replays in reverse.
use crate::router::{Destination, RoutingOutcome};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the history file kept in the organized root.
pub const HISTORY_FILE_NAME: &str = ".dropsort_history.json";

/// A single recorded move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Where the file was before it was routed.
    pub original_path: PathBuf,
    /// Where the file was moved to.
    pub new_path: PathBuf,
    /// The `Folder/Subfolder` the file was routed into.
    pub destination: String,
}

impl Operation {
    /// Builds an operation from a `Moved` outcome.
    pub fn from_outcome(outcome: &RoutingOutcome) -> Option<Self> {
        match outcome {
            RoutingOutcome::Moved {
                from,
                to,
                destination,
            } => Some(Self::new(from, to, destination)),
            _ => None,
        }
    }

    fn new(from: &Path, to: &Path, destination: &Destination) -> Self {
        Self {
            original_path: from.to_path_buf(),
            new_path: to.to_path_buf(),
            destination: destination.to_string(),
        }
    }
}

/// All moves of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of when the run started.
    pub timestamp: String,
    /// The root that was organized.
    pub base_path: PathBuf,
    /// Moves in the order they happened.
    pub operations: Vec<Operation>,
}

/// Errors reading or writing the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write history file: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to read history file: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("invalid history file format: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

impl OperationLog {
    /// Creates an empty log for a root.
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            base_path,
            operations: Vec::new(),
        }
    }

    /// Appends an operation.
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Records the outcome if it is a move; returns true if it was.
    pub fn record(&mut self, outcome: &RoutingOutcome) -> bool {
        match Operation::from_outcome(outcome) {
            Some(operation) => {
                self.add_operation(operation);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the path of the history file for a root.
    pub fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE_NAME)
    }

    /// Writes the log, replacing any previous one.
    pub fn save(&self, base_path: &Path) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(Self::history_file_path(base_path), json).map_err(HistoryError::WriteFailed)
    }

    /// Loads the most recent log, if there is one.
    pub fn load(base_path: &Path) -> Result<Option<Self>, HistoryError> {
        let history_path = Self::history_file_path(base_path);
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&history_path).map_err(HistoryError::ReadFailed)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Removes the history file if present.
    pub fn delete(base_path: &Path) -> Result<(), HistoryError> {
        let history_path = Self::history_file_path(base_path);
        if history_path.exists() {
            fs::remove_file(&history_path).map_err(HistoryError::WriteFailed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_type::FileType;
    use tempfile::TempDir;

    fn moved(from: &str, to: &str) -> RoutingOutcome {
        RoutingOutcome::Moved {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
            destination: Destination {
                folder: "General".to_string(),
                subfolder: "Images".to_string(),
                category: None,
                file_type: FileType::Image,
            },
        }
    }

    #[test]
    fn test_record_only_moves() {
        let mut log = OperationLog::new(PathBuf::from("/root"));
        assert!(log.record(&moved("/root/a.png", "/root/General/Images/a.png")));
        assert!(!log.record(&RoutingOutcome::Skipped {
            path: PathBuf::from("/root/b.png"),
            reason: crate::router::SkipReason::Vanished,
        }));
        assert_eq!(log.operations.len(), 1);
        assert_eq!(log.operations[0].destination, "General/Images");
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut log = OperationLog::new(temp_dir.path().to_path_buf());
        log.record(&moved("/root/a.png", "/root/General/Images/a.png"));
        log.save(temp_dir.path()).expect("Failed to save history");

        let loaded = OperationLog::load(temp_dir.path())
            .expect("Failed to load history")
            .expect("History should exist");
        assert_eq!(loaded.timestamp, log.timestamp);
        assert_eq!(loaded.operations, log.operations);
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(OperationLog::load(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(OperationLog::history_file_path(temp_dir.path()), "{not json").unwrap();
        assert!(matches!(
            OperationLog::load(temp_dir.path()),
            Err(HistoryError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_delete() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        OperationLog::new(temp_dir.path().to_path_buf())
            .save(temp_dir.path())
            .unwrap();
        OperationLog::delete(temp_dir.path()).unwrap();
        assert!(!OperationLog::history_file_path(temp_dir.path()).exists());
        OperationLog::delete(temp_dir.path()).expect("deleting twice is fine");
    }
}
