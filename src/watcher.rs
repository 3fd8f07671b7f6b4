//! Directory watching.
//!
//! [`DirectoryWatcher`] turns filesystem notifications for one directory into
//! a channel of candidate file paths. Only files that appear directly in the
//! watched directory are forwarded: newly created files, and files renamed
//! into it (browsers finish downloads that way). The router never depends on
//! this module; anything producing paths can feed it.

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the pause between two size checks of a settling file.
const MAX_SETTLE_INTERVAL: Duration = Duration::from_millis(500);

/// Errors that can occur while subscribing to or leaving a directory.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The platform watcher could not be created or (un)registered.
    #[error("failed to watch directory: {0}")]
    Notify(#[from] notify::Error),
}

/// A non-recursive watch on a single directory.
///
/// Dropping the watcher ends the subscription.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<PathBuf>,
    root: PathBuf,
}

impl DirectoryWatcher {
    /// Starts watching `root`.
    ///
    /// `root` should be canonical: event paths are compared against it to
    /// keep only its immediate children.
    pub fn start(root: &Path) -> Result<Self, WatchError> {
        let (sender, receiver) = mpsc::channel();
        let watched = root.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in candidate_paths(&watched, &event) {
                        tracing::debug!(path = %path.display(), kind = ?event.kind, "file appeared");
                        if sender.send(path).is_err() {
                            // Receiver gone; the watcher is shutting down.
                            return;
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "watch error"),
            }
        })?;
        watcher.watch(root, RecursiveMode::NonRecursive)?;
        tracing::info!(root = %root.display(), "watching directory");

        Ok(Self {
            watcher,
            receiver,
            root: root.to_path_buf(),
        })
    }

    /// The watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Waits up to `timeout` for the next candidate path.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<PathBuf, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Unsubscribes from the directory.
    pub fn stop(mut self) -> Result<(), WatchError> {
        self.watcher.unwatch(&self.root)?;
        tracing::info!(root = %self.root.display(), "stopped watching");
        Ok(())
    }
}

/// Extracts the paths of files that appeared directly inside `root`.
pub fn candidate_paths(root: &Path, event: &Event) -> Vec<PathBuf> {
    let paths: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other) => {
            event.paths.iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
            event.paths.iter().collect()
        }
        // `paths` is [from, to]; only the new name is interesting.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().into_iter().collect()
        }
        _ => Vec::new(),
    };

    paths
        .into_iter()
        .filter(|path| path.parent() == Some(root))
        .cloned()
        .collect()
}

/// Waits for a freshly created file to stop growing.
///
/// Sleeps `delay`, then compares the file size across up to `checks` further
/// short pauses, returning as soon as two readings agree. Returns false if
/// the file was still changing after the last check. A file that disappears
/// counts as settled; the router reports it as vanished.
pub fn wait_until_settled(path: &Path, delay: Duration, checks: u32) -> bool {
    thread::sleep(delay);

    let interval = delay.min(MAX_SETTLE_INTERVAL);
    let mut last = file_len(path);
    for _ in 0..checks {
        if last.is_none() {
            return true;
        }
        thread::sleep(interval);
        let current = file_len(path);
        if current == last {
            return true;
        }
        last = current;
    }
    checks == 0
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_created_files_are_candidates() {
        let root = Path::new("/dl");
        let created = event(EventKind::Create(CreateKind::File), &["/dl/photo.png"]);
        assert_eq!(
            candidate_paths(root, &created),
            vec![PathBuf::from("/dl/photo.png")]
        );
    }

    #[test]
    fn test_created_folders_are_ignored() {
        let root = Path::new("/dl");
        let created = event(EventKind::Create(CreateKind::Folder), &["/dl/General"]);
        assert!(candidate_paths(root, &created).is_empty());
    }

    #[test]
    fn test_rename_keeps_new_name() {
        let root = Path::new("/dl");
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/dl/movie.mkv.crdownload", "/dl/movie.mkv"],
        );
        assert_eq!(
            candidate_paths(root, &renamed),
            vec![PathBuf::from("/dl/movie.mkv")]
        );
    }

    #[test]
    fn test_nested_paths_are_ignored() {
        let root = Path::new("/dl");
        let created = event(
            EventKind::Create(CreateKind::File),
            &["/dl/General/Images/photo.png", "/elsewhere/photo.png"],
        );
        assert!(candidate_paths(root, &created).is_empty());
    }

    #[test]
    fn test_other_events_are_ignored() {
        let root = Path::new("/dl");
        let removed = event(
            EventKind::Remove(notify::event::RemoveKind::File),
            &["/dl/photo.png"],
        );
        assert!(candidate_paths(root, &removed).is_empty());
    }

    #[test]
    fn test_settled_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("done.bin");
        fs::write(&file, b"complete").unwrap();
        assert!(wait_until_settled(&file, Duration::from_millis(10), 3));
    }

    #[test]
    fn test_missing_file_settles_immediately() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let start = Instant::now();
        assert!(wait_until_settled(
            &temp_dir.path().join("gone.bin"),
            Duration::from_millis(10),
            50
        ));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_watcher_reports_new_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        let watcher = DirectoryWatcher::start(&root).expect("Failed to start watcher");

        let file = root.join("report.pdf");
        fs::write(&file, b"%PDF").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = false;
        while Instant::now() < deadline {
            match watcher.recv_timeout(Duration::from_millis(200)) {
                Ok(path) if path == file => {
                    seen = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(seen, "watcher should report {}", file.display());
        watcher.stop().expect("Failed to stop watcher");
    }
}
