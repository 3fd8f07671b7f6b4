//! Routing of files into the category tree.
//!
//! The [`Router`] turns a path into a [`RoutingOutcome`]: it classifies the
//! filename against a [`RuleSet`], resolves the destination folder, provisions
//! that folder and moves the file there without ever overwriting an existing
//! file. Per-file problems are reported in the outcome, never propagated.
use crate::file_type::FileType;
use crate::rules::{CategoryRule, RuleSet};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The folder a file is routed into, relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Top-level folder: the category name, or the general folder.
    pub folder: String,
    /// Subfolder inside `folder`.
    pub subfolder: String,
    /// The matched category, if any.
    pub category: Option<String>,
    /// The file type the extension classified as.
    pub file_type: FileType,
}

impl Destination {
    /// Returns `folder/subfolder` as a relative path.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.folder).join(&self.subfolder)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.folder, self.subfolder)
    }
}

/// Why a path was not routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The path no longer exists.
    Vanished,
    /// The path is a directory or another non-regular file.
    NotAFile,
    /// The file already sits in the folder it would be routed to.
    AlreadyInPlace,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Vanished => f.write_str("vanished"),
            SkipReason::NotAFile => f.write_str("not a regular file"),
            SkipReason::AlreadyInPlace => f.write_str("already organized"),
        }
    }
}

/// Errors that can occur while routing a single file.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The path has no final component to use as a file name.
    #[error("{} has no file name", path.display())]
    InvalidFileName { path: PathBuf },
    /// Reading the source metadata failed for a reason other than absence.
    #[error("failed to inspect {}: {source}", path.display())]
    InspectFailed { path: PathBuf, source: io::Error },
    /// Creating a destination directory failed.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// Claiming a free destination name failed.
    #[error("failed to reserve {}: {source}", path.display())]
    ReserveFailed { path: PathBuf, source: io::Error },
    /// Moving the file failed; the source is left where it was.
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Result type for routing operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// What happened to one path.
#[derive(Debug)]
pub enum RoutingOutcome {
    /// The file was moved.
    Moved {
        from: PathBuf,
        to: PathBuf,
        destination: Destination,
    },
    /// Nothing was done.
    Skipped { path: PathBuf, reason: SkipReason },
    /// An I/O step failed; the file was not moved.
    Failed { path: PathBuf, error: RouteError },
}

impl RoutingOutcome {
    /// The source path this outcome is about.
    pub fn path(&self) -> &Path {
        match self {
            RoutingOutcome::Moved { from, .. } => from,
            RoutingOutcome::Skipped { path, .. } => path,
            RoutingOutcome::Failed { path, .. } => path,
        }
    }

    /// Returns true if the file was moved.
    pub fn is_moved(&self) -> bool {
        matches!(self, RoutingOutcome::Moved { .. })
    }
}

/// Routes files found under a root directory into its category tree.
///
/// The router is immutable and can be shared across threads. Concurrent
/// calls for different source paths are safe; callers must not route the
/// same source path from two threads at once.
#[derive(Debug, Clone)]
pub struct Router {
    rules: RuleSet,
    root: PathBuf,
}

impl Router {
    /// Creates a router for `root` using `rules`.
    pub fn new(rules: RuleSet, root: impl Into<PathBuf>) -> Self {
        Self {
            rules,
            root: root.into(),
        }
    }

    /// The rule set used for classification.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The root directory files are routed under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Picks the subfolder for a classified file.
    ///
    /// Without a category the file goes to `General/<type>`. With one, the
    /// first applicable step wins:
    /// 1. office documents go to `Documents` if the category allows it
    /// 2. the file's own type, if allowed
    /// 3. `Other`, if allowed
    /// 4. the category's first allowed subfolder
    ///
    /// # Examples
    ///
    /// ```
    /// use dropsort::file_type::{FileType, TypeTable};
    /// use dropsort::router::Router;
    /// use dropsort::rules::{CategoryRule, Layout, RuleSet};
    ///
    /// let sheets = CategoryRule::new("TIMESHEETS", ["timesheet"], vec![FileType::Pdf, FileType::Spreadsheet]).unwrap();
    /// let rules = RuleSet::new(TypeTable::default(), vec![sheets], Layout::default()).unwrap();
    /// let router = Router::new(rules, "/tmp/downloads");
    ///
    /// let category = router.rules().category("TIMESHEETS");
    /// assert_eq!(router.resolve_subfolder(category, FileType::Spreadsheet).to_string(), "TIMESHEETS/Spreadsheets");
    /// assert_eq!(router.resolve_subfolder(category, FileType::Video).to_string(), "TIMESHEETS/PDFs");
    /// assert_eq!(router.resolve_subfolder(None, FileType::Image).to_string(), "General/Images");
    /// ```
    pub fn resolve_subfolder(
        &self,
        category: Option<&CategoryRule>,
        file_type: FileType,
    ) -> Destination {
        let Some(category) = category else {
            return Destination {
                folder: self.rules.general_folder().to_string(),
                subfolder: self.rules.folder_label(file_type).to_string(),
                category: None,
                file_type,
            };
        };

        let subfolder = if file_type.is_office_document() && category.allows(FileType::Document) {
            FileType::Document
        } else if category.allows(file_type) {
            file_type
        } else if category.allows(FileType::Other) {
            FileType::Other
        } else {
            // Semantically odd for e.g. a video in a PDF-only category, but
            // always a folder the category owns.
            category.allowed_subfolders()[0]
        };

        Destination {
            folder: category.name().to_string(),
            subfolder: self.rules.folder_label(subfolder).to_string(),
            category: Some(category.name().to_string()),
            file_type,
        }
    }

    /// Classifies a file name and resolves where it would be routed.
    pub fn destination_for(&self, file_name: &str) -> Destination {
        let extension = Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy())
            .unwrap_or_default();
        let category = self.rules.classify_category(file_name);
        let file_type = self.rules.classify_type(&extension);
        self.resolve_subfolder(category, file_type)
    }

    /// Every folder [`Router::provision`] creates, relative to the root.
    pub fn provisioned_folders(&self) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        for category in self.rules.categories() {
            folders.push(PathBuf::from(category.name()));
            for subfolder in category.allowed_subfolders() {
                folders.push(Path::new(category.name()).join(self.rules.folder_label(*subfolder)));
            }
        }

        let general = self.rules.general_folder();
        folders.push(PathBuf::from(general));
        for file_type in FileType::ALL {
            folders.push(Path::new(general).join(self.rules.folder_label(file_type)));
        }
        folders
    }

    /// Creates the full folder tree under the root.
    ///
    /// Folders that already exist are left untouched, so calling this any
    /// number of times, or while files are being routed, is safe.
    pub fn provision(&self) -> RouteResult<()> {
        for folder in self.provisioned_folders() {
            ensure_dir(&self.root.join(folder))?;
        }
        tracing::debug!(root = %self.root.display(), "provisioned folder tree");
        Ok(())
    }

    /// Routes one file into the category tree.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dropsort::router::{Router, RoutingOutcome};
    /// use dropsort::rules::RuleSet;
    /// use std::path::Path;
    ///
    /// let router = Router::new(RuleSet::default(), "/home/user/Downloads");
    /// match router.route(Path::new("/home/user/Downloads/screenshot.png")) {
    ///     RoutingOutcome::Moved { to, .. } => println!("moved to {}", to.display()),
    ///     RoutingOutcome::Skipped { reason, .. } => println!("skipped: {}", reason),
    ///     RoutingOutcome::Failed { error, .. } => eprintln!("failed: {}", error),
    /// }
    /// ```
    pub fn route(&self, path: &Path) -> RoutingOutcome {
        match self.try_route(path) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "routing failed");
                RoutingOutcome::Failed {
                    path: path.to_path_buf(),
                    error,
                }
            }
        }
    }

    fn try_route(&self, path: &Path) -> RouteResult<RoutingOutcome> {
        let skipped = |reason| {
            tracing::debug!(path = %path.display(), %reason, "skipping");
            Ok(RoutingOutcome::Skipped {
                path: path.to_path_buf(),
                reason,
            })
        };

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return skipped(SkipReason::Vanished),
            Err(e) => {
                return Err(RouteError::InspectFailed {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        if !metadata.is_file() {
            return skipped(SkipReason::NotAFile);
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| RouteError::InvalidFileName {
                path: path.to_path_buf(),
            })?;

        let destination = self.destination_for(&file_name.to_string_lossy());
        let folder = self.root.join(destination.relative_path());

        if is_same_dir(path.parent(), &folder) {
            return skipped(SkipReason::AlreadyInPlace);
        }

        ensure_dir(&folder)?;
        let target = claim_destination(&folder, file_name)?;

        if let Err(e) = relocate(path, &target) {
            release_claim(&target);
            return Err(RouteError::FileMoveFailure {
                from: path.to_path_buf(),
                to: target,
                source: e,
            });
        }

        tracing::info!(
            from = %path.display(),
            to = %target.display(),
            destination = %destination,
            "moved file"
        );
        Ok(RoutingOutcome::Moved {
            from: path.to_path_buf(),
            to: target,
            destination,
        })
    }
}

fn ensure_dir(path: &Path) -> RouteResult<()> {
    fs::create_dir_all(path).map_err(|e| RouteError::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn is_same_dir(parent: Option<&Path>, folder: &Path) -> bool {
    let Some(parent) = parent else {
        return false;
    };
    match (fs::canonicalize(parent), fs::canonicalize(folder)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Claims the first free name in `folder` by creating an empty placeholder.
///
/// The name is tried as is, then as `stem_1.ext`, `stem_2.ext` and so on.
/// Exclusive creation makes the claim atomic, so a name taken by anyone else
/// in the meantime just moves the search on to the next counter.
fn claim_destination(folder: &Path, file_name: &OsStr) -> RouteResult<PathBuf> {
    let mut counter: u64 = 0;
    loop {
        let candidate = if counter == 0 {
            folder.join(file_name)
        } else {
            folder.join(numbered_name(file_name, counter))
        };

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => {
                return Err(RouteError::ReserveFailed {
                    path: candidate,
                    source: e,
                });
            }
        }
    }
}

/// Removes a claimed placeholder after a failed move, so the folder is left
/// as we found it. Returns false if the placeholder is still there.
fn release_claim(target: &Path) -> bool {
    match fs::remove_file(target) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %target.display(),
                "could not remove reserved destination"
            );
            false
        }
    }
}

/// `report.final.pdf` with counter 2 becomes `report.final_2.pdf`.
fn numbered_name(file_name: &OsStr, counter: u64) -> OsString {
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);

    let mut name = stem.to_os_string();
    name.push(format!("_{}", counter));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Moves `from` onto the placeholder at `to`.
///
/// Tries an atomic rename first and falls back to copy, verify and delete
/// when renaming is not possible (e.g. across filesystems).
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, from = %from.display(), "rename failed, falling back to copy");
            copy_and_remove(from, to)
        }
    }
}

fn copy_and_remove(from: &Path, to: &Path) -> io::Result<()> {
    let expected = fs::metadata(from)?.len();
    let copied = fs::copy(from, to)?;
    if copied != expected {
        return Err(io::Error::other(format!(
            "copied {} of {} bytes",
            copied, expected
        )));
    }
    fs::remove_file(from)
}
