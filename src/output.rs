//! Output formatting and styling module.
//!
//! Provides a centralized interface for all user-facing output: colored
//! status lines, one line per routed file, the folder tree banner, progress
//! bars and summary tables. Diagnostics go through `tracing` instead.

use crate::router::{Router, RoutingOutcome};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// OutputFormatter::success("Restored: 3");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// OutputFormatter::warning("2 file(s) could not be organized");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Formats the line reported for a routed file.
    ///
    /// Returns `None` for skipped paths, which are only logged.
    ///
    /// # Example
    ///
    /// ```
    /// use dropsort::file_type::FileType;
    /// use dropsort::output::OutputFormatter;
    /// use dropsort::router::{Destination, RoutingOutcome};
    /// use std::path::PathBuf;
    ///
    /// let outcome = RoutingOutcome::Moved {
    ///     from: PathBuf::from("/dl/photo.png"),
    ///     to: PathBuf::from("/dl/General/Images/photo.png"),
    ///     destination: Destination {
    ///         folder: "General".to_string(),
    ///         subfolder: "Images".to_string(),
    ///         category: None,
    ///         file_type: FileType::Image,
    ///     },
    /// };
    /// let line = OutputFormatter::outcome_line(&outcome).unwrap();
    /// assert!(line.contains("photo.png → General/Images/"));
    /// ```
    pub fn outcome_line(outcome: &RoutingOutcome) -> Option<String> {
        match outcome {
            RoutingOutcome::Moved {
                from,
                to,
                destination,
            } => {
                let original = display_name(from);
                let stored = display_name(to);
                let renamed = if original != stored {
                    format!(" (as {})", stored)
                } else {
                    String::new()
                };
                Some(format!(
                    "{} Organized: {} → {}/{}",
                    "✓".green(),
                    original,
                    destination,
                    renamed
                ))
            }
            RoutingOutcome::Failed { path, error } => Some(format!(
                "{} Error organizing {}: {}",
                "✗".red(),
                path.display(),
                error
            )),
            RoutingOutcome::Skipped { .. } => None,
        }
    }

    /// Prints the line for a routed file, if it has one.
    pub fn outcome(outcome: &RoutingOutcome) {
        if let Some(line) = Self::outcome_line(outcome) {
            match outcome {
                RoutingOutcome::Failed { .. } => eprintln!("{}", line),
                _ => println!("{}", line),
            }
        }
    }

    /// Prints the folder structure a router provisions.
    pub fn folder_tree(router: &Router) {
        let rules = router.rules();

        Self::header("Main categories (matched by filename keyword):");
        for category in rules.categories() {
            println!("  - {}/", category.name().bold());
            for subfolder in category.allowed_subfolders() {
                println!("      └─ {}/", rules.folder_label(*subfolder));
            }
        }

        println!(
            "\n  - {}/ (for files not matching keywords)",
            rules.general_folder().bold()
        );
        for file_type in crate::file_type::FileType::ALL {
            println!("      └─ {}/", rules.folder_label(file_type));
        }
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(10);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints a summary table with file counts per destination.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("Screenshots/Images".to_string(), 15);
    /// counts.insert("General/PDFs".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(destination_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut destinations: Vec<_> = destination_counts.iter().collect();
        destinations.sort_by_key(|&(name, _)| name);

        let width = destinations
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Destination".len());

        println!(
            "{:<width$} | {}",
            "Destination".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (destination, count) in &destinations {
            println!(
                "{:<width$} | {} {}",
                destination,
                count.to_string().green(),
                plural(**count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dropsort::output::OutputFormatter;
    /// OutputFormatter::dry_run_notice("No files were modified.");
    /// ```
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
