//! Command-line interface module for dropsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Resolving the directory to organize
//! - The one-off organize sweep and its dry run
//! - Watch mode
//! - Undo reporting

use crate::config::{CompiledFilters, Config};
use crate::history::OperationLog;
use crate::output::OutputFormatter;
use crate::router::{Router, RoutingOutcome};
use crate::undo::UndoManager;
use crate::watcher::{self, DirectoryWatcher};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

/// How often the watch loop checks for Ctrl-C while no files arrive.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Sorts downloaded files into keyword categories and file-type folders.
#[derive(Debug, Parser)]
#[command(name = "dropsort", version, about)]
pub struct Cli {
    /// Directory to organize [default: `[watch].directory`, then ~/Downloads]
    pub dir: Option<PathBuf>,

    /// Configuration file to use instead of the usual lookup
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Organize new files as they appear (default)
    Watch {
        /// Whether to organize files already in the directory first
        #[arg(long, value_enum, default_value_t = ExistingFiles::Ask)]
        existing: ExistingFiles,

        /// Milliseconds to wait after a file appears before moving it
        #[arg(long, value_name = "N")]
        settle_ms: Option<u64>,
    },
    /// Organize the files currently in the directory once
    Organize {
        /// Show where files would go without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Revert the last run
    Undo,
    /// Print the folder layout
    Tree,
}

impl Default for Command {
    fn default() -> Self {
        Command::Watch {
            existing: ExistingFiles::Ask,
            settle_ms: None,
        }
    }
}

/// What watch mode does with files present before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExistingFiles {
    /// Ask on the terminal; skip when not interactive
    Ask,
    /// Organize them before watching
    Yes,
    /// Leave them where they are
    No,
}

/// Everything a command needs to route files under one root.
struct Session {
    router: Router,
    filters: CompiledFilters,
    config: Config,
}

impl Session {
    fn new(root: PathBuf, config: Config) -> Result<Self, String> {
        let rules = config
            .rule_set()
            .map_err(|e| format!("Error loading rules: {}", e))?;
        let filters = config
            .compile_filters()
            .map_err(|e| format!("Error compiling filters: {}", e))?;
        Ok(Self {
            router: Router::new(rules, root),
            filters,
            config,
        })
    }

    fn root(&self) -> &Path {
        self.router.root()
    }
}

/// Runs the parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dropsort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["dropsort", "/home/user/Downloads", "organize", "--dry-run"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let root = resolve_directory(cli.dir, &config)?;
    run_cli_with_config(cli.command.unwrap_or_default(), &root, config)
}

/// Runs one command against `root` with an already loaded configuration.
pub fn run_cli_with_config(command: Command, root: &Path, config: Config) -> Result<(), String> {
    let root = canonical_dir(root)?;
    tracing::debug!(root = %root.display(), ?command, "running command");

    match command {
        Command::Watch {
            existing,
            settle_ms,
        } => watch_directory(&Session::new(root, config)?, existing, settle_ms),
        Command::Organize { dry_run: true } => {
            organize_directory_dry_run(&Session::new(root, config)?)
        }
        Command::Organize { dry_run: false } => organize_directory(&Session::new(root, config)?),
        Command::Undo => undo_organization(&root),
        Command::Tree => {
            let session = Session::new(root, config)?;
            OutputFormatter::plain(&format!(
                "Folder layout for {}",
                session.root().display()
            ));
            OutputFormatter::folder_tree(&session.router);
            Ok(())
        }
    }
}

/// Picks the directory to work on.
///
/// The command line argument wins, then `[watch].directory` from the
/// configuration, then `~/Downloads`. The result is canonical.
pub fn resolve_directory(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf, String> {
    let dir = arg
        .or_else(|| config.watch.directory.clone())
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Downloads")))
        .ok_or_else(|| "No directory given and $HOME is not set".to_string())?;
    canonical_dir(&dir)
}

fn canonical_dir(dir: &Path) -> Result<PathBuf, String> {
    let root = fs::canonicalize(dir)
        .map_err(|e| format!("Error opening directory {}: {}", dir.display(), e))?;
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }
    Ok(root)
}

/// Lists the top-level files of `root` that pass the filters, sorted by name.
///
/// Subdirectories, including the category tree itself, are never listed.
pub fn collect_candidates(root: &Path, filters: &CompiledFilters) -> Result<Vec<PathBuf>, String> {
    let entries = fs::read_dir(root)
        .map_err(|e| format!("Error reading directory {}: {}", root.display(), e))?;

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| filters.should_include(path))
        .collect();
    candidates.sort();
    Ok(candidates)
}

/// Routes every top-level file once, with a progress bar and summary.
fn organize_directory(session: &Session) -> Result<(), String> {
    let root = session.root();
    OutputFormatter::info(&format!("Organizing contents of: {}", root.display()));

    session
        .router
        .provision()
        .map_err(|e| format!("Error creating folders: {}", e))?;

    let candidates = collect_candidates(root, &session.filters)?;
    if candidates.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return Ok(());
    }

    let mut log = OperationLog::new(root.to_path_buf());
    let mut destination_counts: HashMap<String, usize> = HashMap::new();
    let mut failures = 0;

    let pb = OutputFormatter::create_progress_bar(candidates.len() as u64);
    for path in &candidates {
        let outcome = session.router.route(path);
        pb.suspend(|| OutputFormatter::outcome(&outcome));
        match &outcome {
            RoutingOutcome::Moved { destination, .. } => {
                *destination_counts.entry(destination.to_string()).or_insert(0) += 1;
            }
            RoutingOutcome::Failed { .. } => failures += 1,
            RoutingOutcome::Skipped { .. } => {}
        }
        log.record(&outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let moved = log.operations.len();
    OutputFormatter::summary_table(&destination_counts, moved);
    save_history(&log, root);

    if failures > 0 {
        OutputFormatter::warning(&format!(
            "{} file(s) could not be organized. Please review errors above.",
            failures
        ));
    }
    Ok(())
}

/// Prints where every top-level file would go without touching anything.
fn organize_directory_dry_run(session: &Session) -> Result<(), String> {
    let root = session.root();
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", root.display()));

    let candidates = collect_candidates(root, &session.filters)?;
    if candidates.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return Ok(());
    }

    let mut destination_counts: HashMap<String, usize> = HashMap::new();
    for path in &candidates {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination = session.router.destination_for(&name);
        OutputFormatter::plain(&format!(" - {} → {}/", name, destination));
        *destination_counts.entry(destination.to_string()).or_insert(0) += 1;
    }

    OutputFormatter::summary_table(&destination_counts, candidates.len());
    OutputFormatter::dry_run_notice("No files were modified.");
    Ok(())
}

/// Watches the root until Ctrl-C, routing each new file once it settles.
fn watch_directory(
    session: &Session,
    existing: ExistingFiles,
    settle_ms: Option<u64>,
) -> Result<(), String> {
    let root = session.root();
    let settle_delay = settle_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| session.config.watch.settle_delay());
    let settle_checks = session.config.watch.settle_checks;

    session
        .router
        .provision()
        .map_err(|e| format!("Error creating folders: {}", e))?;
    OutputFormatter::info(&format!("Folder structure ready in: {}", root.display()));
    OutputFormatter::folder_tree(&session.router);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .map_err(|e| format!("Error installing Ctrl-C handler: {}", e))?;

    // Subscribe before the sweep so files arriving meanwhile are not missed.
    let watcher = DirectoryWatcher::start(root).map_err(|e| e.to_string())?;
    let mut log = OperationLog::new(root.to_path_buf());

    if should_organize_existing(existing, root) {
        for path in collect_candidates(root, &session.filters)? {
            let outcome = session.router.route(&path);
            OutputFormatter::outcome(&outcome);
            log.record(&outcome);
        }
        save_history(&log, root);
    }

    OutputFormatter::header(&format!("Watching {} (press Ctrl+C to stop)", root.display()));

    while !shutdown.load(Ordering::SeqCst) {
        let path = match watcher.recv_timeout(SHUTDOWN_POLL_INTERVAL) {
            Ok(path) => path,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err("Watcher stopped unexpectedly".to_string());
            }
        };

        if !session.filters.should_include(&path) {
            tracing::debug!(path = %path.display(), "filtered out");
            continue;
        }

        if !watcher::wait_until_settled(&path, settle_delay, settle_checks) {
            tracing::warn!(path = %path.display(), "file still changing, moving it anyway");
        }

        let outcome = session.router.route(&path);
        OutputFormatter::outcome(&outcome);
        if log.record(&outcome) {
            save_history(&log, root);
        }
    }

    watcher.stop().map_err(|e| e.to_string())?;
    OutputFormatter::plain("\nStopped watching.");
    Ok(())
}

fn should_organize_existing(existing: ExistingFiles, root: &Path) -> bool {
    match existing {
        ExistingFiles::Yes => true,
        ExistingFiles::No => false,
        ExistingFiles::Ask if !io::stdin().is_terminal() => false,
        ExistingFiles::Ask => confirm(&format!(
            "Organize existing files in {}? [y/N] ",
            root.display()
        )),
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{}", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Writes the run's history if it has anything to undo.
fn save_history(log: &OperationLog, root: &Path) {
    if log.is_empty() {
        return;
    }
    match log.save(root) {
        Ok(()) => tracing::debug!(operations = log.operations.len(), "history saved"),
        Err(e) => OutputFormatter::warning(&format!(
            "Could not save history, undo will not be available: {}",
            e
        )),
    }
}

/// Undoes the previous run and reports what happened.
fn undo_organization(root: &Path) -> Result<(), String> {
    OutputFormatter::info("Undoing previous organization...");

    let report = UndoManager::undo(root).map_err(|e| format!("Error: {}", e))?;

    OutputFormatter::success(&format!("Restored: {}", report.restored_files));

    if !report.skipped_files.is_empty() {
        OutputFormatter::warning(&format!("Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::error(&format!("Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    - {}: {}", path.display(), reason));
        }
        OutputFormatter::warning("History file was NOT deleted due to failures.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_command_is_watch() {
        let cli = Cli::try_parse_from(["dropsort"]).unwrap();
        assert!(cli.dir.is_none());
        assert_eq!(cli.command.unwrap_or_default(), Command::default());
    }

    #[test]
    fn test_parse_dir_and_subcommand() {
        let cli = Cli::try_parse_from(["dropsort", "/tmp/dl", "organize", "--dry-run"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/dl")));
        assert_eq!(cli.command, Some(Command::Organize { dry_run: true }));
    }

    #[test]
    fn test_parse_watch_options() {
        let cli = Cli::try_parse_from([
            "dropsort",
            "watch",
            "--existing",
            "yes",
            "--settle-ms",
            "250",
            "--config",
            "my.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert_eq!(
            cli.command,
            Some(Command::Watch {
                existing: ExistingFiles::Yes,
                settle_ms: Some(250),
            })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_existing_value() {
        assert!(Cli::try_parse_from(["dropsort", "watch", "--existing", "maybe"]).is_err());
    }

    #[test]
    fn test_resolve_directory_prefers_argument() {
        let arg_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::default();
        config.watch.directory = Some(config_dir.path().to_path_buf());

        let resolved = resolve_directory(Some(arg_dir.path().to_path_buf()), &config).unwrap();
        assert_eq!(resolved, fs::canonicalize(arg_dir.path()).unwrap());

        let resolved = resolve_directory(None, &config).unwrap();
        assert_eq!(resolved, fs::canonicalize(config_dir.path()).unwrap());
    }

    #[test]
    fn test_resolve_directory_rejects_files_and_missing_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(resolve_directory(Some(file), &Config::default()).is_err());
        assert!(
            resolve_directory(Some(temp_dir.path().join("missing")), &Config::default()).is_err()
        );
    }

    #[test]
    fn test_collect_candidates_lists_filtered_top_level_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("General/Images")).unwrap();
        fs::write(root.join("General/Images/old.png"), "x").unwrap();
        fs::write(root.join("b.pdf"), "x").unwrap();
        fs::write(root.join("a.png"), "x").unwrap();
        fs::write(root.join(".hidden"), "x").unwrap();
        fs::write(root.join("movie.mkv.crdownload"), "x").unwrap();

        let filters = Config::default().compile_filters().unwrap();
        let candidates = collect_candidates(root, &filters).unwrap();
        assert_eq!(candidates, vec![root.join("a.png"), root.join("b.pdf")]);
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
