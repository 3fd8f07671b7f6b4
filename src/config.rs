//! Configuration loading.
//!
//! Everything dropsort can be told lives in one TOML file: the folder layout,
//! the extension table, the keyword categories, watch settings and the file
//! filters deciding which paths are handed to the router at all.
//!
//! # Configuration File Format
//!
//! ```toml
//! [layout]
//! general_folder = "General"
//! other_folder = "Other"
//!
//! [watch]
//! directory = "/home/me/Downloads"
//! settle_delay_ms = 1000
//! settle_checks = 5
//!
//! [[types]]
//! name = "Images"
//! extensions = [".jpg", ".png"]
//!
//! [[categories]]
//! name = "Screenshots"
//! keywords = ["screenshot", "capture"]
//! subfolders = ["Images"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp"]
//! extensions = ["crdownload", "part"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! `[[types]]` and `[[categories]]` replace the built-in tables when present.

use crate::file_type::{FileType, TypeTable};
use crate::history::HISTORY_FILE_NAME;
use crate::rules::{
    CategoryRule, DEFAULT_GENERAL_FOLDER, DEFAULT_OTHER_FOLDER, Layout, RuleError, RuleSet,
    default_categories,
};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE_NAME: &str = ".dropsortrc.toml";

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// The categories or layout do not form a valid rule set.
    #[error("Invalid rules: {0}")]
    InvalidRules(#[from] RuleError),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Replaces the built-in extension table when present.
    #[serde(default)]
    pub types: Option<Vec<TypeConfig>>,

    /// Replaces the built-in categories when present.
    #[serde(default)]
    pub categories: Option<Vec<CategoryConfig>>,

    #[serde(default)]
    pub filters: FilterRules,
}

/// Names of the fallback folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_general_folder")]
    pub general_folder: String,
    #[serde(default = "default_other_folder")]
    pub other_folder: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            general_folder: default_general_folder(),
            other_folder: default_other_folder(),
        }
    }
}

fn default_general_folder() -> String {
    DEFAULT_GENERAL_FOLDER.to_string()
}

fn default_other_folder() -> String {
    DEFAULT_OTHER_FOLDER.to_string()
}

/// Settings for watch mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch; the command line wins over this.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// How long to wait after a file appears before routing it.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How many extra size checks to make while a file is still growing.
    #[serde(default = "default_settle_checks")]
    pub settle_checks: u32,
}

impl WatchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: None,
            settle_delay_ms: default_settle_delay_ms(),
            settle_checks: default_settle_checks(),
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_settle_checks() -> u32 {
    5
}

/// One entry of the extension table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeConfig {
    pub name: FileType,
    pub extensions: Vec<String>,
}

/// One keyword category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub subfolders: Vec<FileType>,
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

fn default_enable_hidden_files() -> bool {
    false
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.tmp").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude. Defaults to in-progress download suffixes.
    #[serde(default = "default_excluded_extensions")]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude (for advanced users).
    #[serde(default)]
    pub regex: Vec<String>,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self {
            filenames: Vec::new(),
            patterns: Vec::new(),
            extensions: default_excluded_extensions(),
            regex: Vec::new(),
        }
    }
}

fn default_excluded_extensions() -> Vec<String> {
    ["crdownload", "part", "partial", "download", "tmp"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.dropsortrc.toml` in the current directory
    /// 3. Look for `~/.config/dropsort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dropsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Builds the immutable rule set described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a category or folder name is invalid.
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let types = match &self.types {
            Some(entries) => {
                let mut table = TypeTable::empty();
                for entry in entries {
                    for ext in &entry.extensions {
                        table.add_extension_mapping(ext, entry.name);
                    }
                }
                table
            }
            None => TypeTable::default(),
        };

        let categories = match &self.categories {
            Some(entries) => entries
                .iter()
                .map(|c| CategoryRule::new(c.name.clone(), &c.keywords, c.subfolders.clone()))
                .collect::<Result<Vec<_>, _>>()?,
            None => default_categories(),
        };

        let layout = Layout {
            general_folder: self.layout.general_folder.clone(),
            other_folder: self.layout.other_folder.clone(),
        };

        Ok(RuleSet::new(types, categories, layout)?)
    }

    /// Compiles the filter rules for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self.filters.clone())
    }
}

/// Compiled filter structures for matching candidate files.
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.into_iter().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file should be routed.
    ///
    /// The history and local config files are never routed. Otherwise checks
    /// run in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if file_name == HISTORY_FILE_NAME || file_name == LOCAL_CONFIG_FILE_NAME {
            return false;
        }

        if self.matches_include_patterns(file_path) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_exclude_patterns(file_path) {
            return false;
        }

        !self.matches_exclude_regex(&file_name)
    }

    fn matches_include_patterns(&self, file_path: &Path) -> bool {
        self.include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path) || matches_name(pattern, file_path))
    }

    fn matches_exclude_patterns(&self, file_path: &Path) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path) || matches_name(pattern, file_path))
    }

    fn matches_exclude_regex(&self, file_name: &str) -> bool {
        self.exclude_regexes
            .iter()
            .any(|regex| regex.is_match(file_name))
    }
}

/// Candidate paths are absolute, so patterns like `*.tmp` are also tried
/// against the bare file name.
fn matches_name(pattern: &Pattern, file_path: &Path) -> bool {
    file_path
        .file_name()
        .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}
