//! Undo of the most recent run.
//!
//! Replays the recorded history in reverse, moving every routed file back to
//! where it was found.
use crate::history::{HistoryError, Operation, OperationLog};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that could not be restored, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files that were skipped because they are no longer where they were put.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of operations processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if the undo was completely successful.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Errors that prevent an undo from starting.
#[derive(Debug, Error)]
pub enum UndoError {
    #[error("directory does not exist: {}", .0.display())]
    InvalidBasePath(PathBuf),
    #[error("no previous organization found to undo")]
    NothingToUndo,
    #[error(transparent)]
    History(#[from] HistoryError),
}

enum RestoreFailure {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}

/// Manages undo operations for file organization.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent run recorded under `base_path`.
    ///
    /// Operations are reversed last-first. A file no longer at its recorded
    /// location is skipped; a file occupying the original location is renamed
    /// to `name.bak.<timestamp>` first, numbered when that name is taken. The
    /// history file is deleted only when every file was restored.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dropsort::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/home/user/Downloads")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(base_path: &Path) -> Result<UndoReport, UndoError> {
        if !base_path.is_dir() {
            return Err(UndoError::InvalidBasePath(base_path.to_path_buf()));
        }

        let log = OperationLog::load(base_path)?.ok_or(UndoError::NothingToUndo)?;

        let mut report = UndoReport::default();
        for operation in log.operations.iter().rev() {
            match Self::restore_file(operation) {
                Ok(()) => report.restored_files += 1,
                Err(RestoreFailure::Missing(path, reason)) => {
                    report.skipped_files.push((path, reason))
                }
                Err(RestoreFailure::Failed(path, reason)) => {
                    report.failed_restores.push((path, reason))
                }
            }
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            tracing::warn!(error = %e, "could not delete history file");
        }

        Ok(report)
    }

    fn restore_file(operation: &Operation) -> Result<(), RestoreFailure> {
        if !operation.new_path.exists() {
            return Err(RestoreFailure::Missing(
                operation.new_path.clone(),
                "File not found at expected location".to_string(),
            ));
        }

        if operation.original_path.exists() {
            Self::backup_conflicting_file(&operation.original_path).map_err(|e| {
                RestoreFailure::Failed(
                    operation.original_path.clone(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        fs::rename(&operation.new_path, &operation.original_path).map_err(|e| {
            RestoreFailure::Failed(
                operation.new_path.clone(),
                format!("Failed to restore file: {}", e),
            )
        })?;

        tracing::debug!(
            from = %operation.new_path.display(),
            to = %operation.original_path.display(),
            "restored file"
        );
        Ok(())
    }

    /// Moves the file at `path` out of the way and returns where it went.
    ///
    /// The backup name is claimed with an exclusive create before the rename,
    /// so an existing backup is never replaced.
    fn backup_conflicting_file(path: &Path) -> io::Result<PathBuf> {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut counter: u64 = 0;
        loop {
            let candidate = Self::generate_backup_path(path, &timestamp, counter);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(_) => {
                    if let Err(e) = fs::rename(path, &candidate) {
                        if let Err(cleanup) = fs::remove_file(&candidate) {
                            tracing::warn!(
                                error = %cleanup,
                                path = %candidate.display(),
                                "could not remove reserved backup name"
                            );
                        }
                        return Err(e);
                    }
                    tracing::debug!(
                        from = %path.display(),
                        to = %candidate.display(),
                        "backed up conflicting file"
                    );
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// `file.txt` becomes `file.txt.bak.20251109-143052`, then
    /// `file.txt.bak.20251109-143052_1` and so on.
    fn generate_backup_path(original_path: &Path, timestamp: &str, counter: u64) -> PathBuf {
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let name = if counter == 0 {
            format!("{}.bak.{}", filename, timestamp)
        } else {
            format!("{}.bak.{}_{}", filename, timestamp, counter)
        };
        original_path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use crate::rules::RuleSet;
    use std::fs;
    use tempfile::TempDir;

    fn route_and_record(router: &Router, files: &[&Path]) {
        let mut log = OperationLog::new(router.root().to_path_buf());
        for file in files {
            let outcome = router.route(file);
            assert!(log.record(&outcome), "expected a move: {:?}", outcome);
        }
        log.save(router.root()).expect("Failed to save history");
    }

    #[test]
    fn test_undo_no_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = UndoManager::undo(temp_dir.path());
        assert!(matches!(result, Err(UndoError::NothingToUndo)));
    }

    #[test]
    fn test_undo_single_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let router = Router::new(RuleSet::default(), temp_dir.path());
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "test content").expect("Failed to write test file");

        route_and_record(&router, &[&file_path]);
        let moved_file = temp_dir.path().join("General/Text Files/test.txt");
        assert!(moved_file.exists());

        let report = UndoManager::undo(temp_dir.path()).expect("Undo failed");
        assert_eq!(report.restored_files, 1);
        assert!(report.is_complete_success());
        assert!(file_path.exists());
        assert!(!moved_file.exists());
        assert!(!OperationLog::history_file_path(temp_dir.path()).exists());
    }

    #[test]
    fn test_undo_collision_renamed_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let router = Router::new(RuleSet::default(), temp_dir.path());

        let first = temp_dir.path().join("screenshot.png");
        fs::write(&first, "first").unwrap();
        let mut log = OperationLog::new(temp_dir.path().to_path_buf());
        log.record(&router.route(&first));
        fs::write(&first, "second").unwrap();
        log.record(&router.route(&first));
        log.save(temp_dir.path()).unwrap();

        let report = UndoManager::undo(temp_dir.path()).expect("Undo failed");

        // The later move is undone first, then the earlier one bumps it to a backup.
        assert_eq!(report.restored_files, 2);
        assert_eq!(fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(report.total_processed(), 2);
    }

    #[test]
    fn test_undo_many_same_name_files_keeps_every_version() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let router = Router::new(RuleSet::default(), temp_dir.path());
        let source = temp_dir.path().join("screenshot.png");

        let mut log = OperationLog::new(temp_dir.path().to_path_buf());
        for body in ["first", "second", "third", "fourth"] {
            fs::write(&source, body).unwrap();
            assert!(log.record(&router.route(&source)));
        }
        log.save(temp_dir.path()).unwrap();

        let report = UndoManager::undo(temp_dir.path()).expect("Undo failed");
        assert_eq!(report.restored_files, 4);
        assert!(report.is_complete_success());

        let mut bodies: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter(|e| e.file_name().to_string_lossy().starts_with("screenshot.png"))
            .map(|e| fs::read_to_string(e.path()).unwrap())
            .collect();
        bodies.sort();
        assert_eq!(bodies, vec!["first", "fourth", "second", "third"]);
        assert_eq!(fs::read_to_string(&source).unwrap(), "first");
    }

    #[test]
    fn test_backup_never_replaces_existing_backup() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("notes.txt");

        let mut backups = Vec::new();
        for body in ["one", "two", "three"] {
            fs::write(&path, body).unwrap();
            backups.push(UndoManager::backup_conflicting_file(&path).unwrap());
        }

        assert!(!path.exists());
        let contents: Vec<String> = backups
            .iter()
            .map(|b| fs::read_to_string(b).unwrap())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_generate_backup_path() {
        let path = Path::new("/dl/notes.txt");
        assert_eq!(
            UndoManager::generate_backup_path(path, "20251109-143052", 0),
            Path::new("/dl/notes.txt.bak.20251109-143052")
        );
        assert_eq!(
            UndoManager::generate_backup_path(path, "20251109-143052", 2),
            Path::new("/dl/notes.txt.bak.20251109-143052_2")
        );
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let router = Router::new(RuleSet::default(), temp_dir.path());
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "original content").expect("Failed to write file");

        route_and_record(&router, &[&file_path]);
        fs::write(&file_path, "new content").expect("Failed to create conflict");

        let report = UndoManager::undo(temp_dir.path()).expect("Undo failed");
        assert_eq!(report.restored_files, 1);
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "original content"
        );

        let backups = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_undo_with_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut log = OperationLog::new(temp_dir.path().to_path_buf());
        log.add_operation(Operation {
            original_path: temp_dir.path().join("nonexistent.txt"),
            new_path: temp_dir.path().join("General/Text Files/nonexistent.txt"),
            destination: "General/Text Files".to_string(),
        });
        log.save(temp_dir.path()).unwrap();

        let report = UndoManager::undo(temp_dir.path()).expect("Undo failed");
        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert!(OperationLog::history_file_path(temp_dir.path()).exists());
    }

    #[test]
    fn test_undo_invalid_base_path() {
        let result = UndoManager::undo(Path::new("/non/existent/path"));
        assert!(matches!(result, Err(UndoError::InvalidBasePath(_))));
    }
}
