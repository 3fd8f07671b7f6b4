//! Keyword rules and the immutable rule set the router classifies against.
//!
//! A [`RuleSet`] bundles three things:
//! - the extension table ([`TypeTable`]) that yields a file's [`FileType`]
//! - an ordered list of [`CategoryRule`]s, matched by filename keyword
//! - the [`Layout`] naming the fallback folder and the unrecognized-type bucket
//!
//! Rule order matters: the first rule with a matching keyword wins.
//!
//! # Examples
//!
//! ```
//! use dropsort::file_type::FileType;
//! use dropsort::rules::{CategoryRule, Layout, RuleSet};
//! use dropsort::file_type::TypeTable;
//!
//! let work = CategoryRule::new("WORK", ["meeting"], vec![FileType::Pdf]).unwrap();
//! let rules = RuleSet::new(TypeTable::default(), vec![work], Layout::default()).unwrap();
//!
//! assert_eq!(rules.classify_category("Meeting_Notes.pdf").map(|c| c.name()), Some("WORK"));
//! assert!(rules.classify_category("holiday.png").is_none());
//! assert_eq!(rules.classify_type(".pdf"), FileType::Pdf);
//! ```

use crate::file_type::{FileType, TypeTable};
use std::collections::HashSet;
use thiserror::Error;

/// Default name of the folder that receives files matching no category.
pub const DEFAULT_GENERAL_FOLDER: &str = "General";
/// Default name of the bucket for unrecognized file types.
pub const DEFAULT_OTHER_FOLDER: &str = "Other";

/// Errors raised while assembling a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A folder or category name cannot be used as a single path component.
    #[error("'{0}' is not a valid folder name")]
    InvalidFolderName(String),
    /// Two categories share a name (compared case-insensitively).
    #[error("duplicate category '{0}'")]
    DuplicateCategory(String),
    /// A category would share its folder with the general fallback tree.
    #[error("category '{0}' collides with the general folder")]
    ReservedCategoryName(String),
    /// A keyword has no alphanumeric character and could never match sensibly.
    #[error("category '{category}' has an unusable keyword '{keyword}'")]
    InvalidKeyword { category: String, keyword: String },
    /// A category must accept at least one subfolder.
    #[error("category '{0}' must allow at least one subfolder")]
    NoSubfolders(String),
    /// The bucket for unrecognized files would share a folder with a real type.
    #[error("other folder '{0}' collides with a file type folder")]
    OtherFolderCollides(String),
}

/// One keyword-to-category routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    name: String,
    keywords: Vec<String>,
    allowed_subfolders: Vec<FileType>,
}

impl CategoryRule {
    /// Creates a rule, lowercasing its keywords.
    ///
    /// # Errors
    ///
    /// Fails if the name is not a usable folder name, a keyword has no
    /// alphanumeric character, or `allowed_subfolders` is empty.
    pub fn new<I, S>(
        name: impl Into<String>,
        keywords: I,
        allowed_subfolders: Vec<FileType>,
    ) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if !is_valid_folder_name(&name) {
            return Err(RuleError::InvalidFolderName(name));
        }

        let mut lowered = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref();
            if !keyword.chars().any(char::is_alphanumeric) {
                return Err(RuleError::InvalidKeyword {
                    category: name,
                    keyword: keyword.to_string(),
                });
            }
            lowered.push(keyword.to_lowercase());
        }

        if allowed_subfolders.is_empty() {
            return Err(RuleError::NoSubfolders(name));
        }

        let mut seen = HashSet::new();
        let allowed_subfolders = allowed_subfolders
            .into_iter()
            .filter(|ft| seen.insert(*ft))
            .collect();

        Ok(Self {
            name,
            keywords: lowered,
            allowed_subfolders,
        })
    }

    /// The category name, which is also its top-level folder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lowercased keywords, in declaration order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The subfolders this category accepts, in declaration order.
    pub fn allowed_subfolders(&self) -> &[FileType] {
        &self.allowed_subfolders
    }

    /// Returns true if the category accepts the given subfolder.
    pub fn allows(&self, file_type: FileType) -> bool {
        self.allowed_subfolders.contains(&file_type)
    }

    /// Returns the first keyword found in an already-lowercased filename.
    fn matching_keyword(&self, lowercased: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|keyword| lowercased.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

/// Names of the fallback folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Folder for files matching no category, e.g. `General`.
    pub general_folder: String,
    /// Bucket for unrecognized file types, e.g. `Other`.
    pub other_folder: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            general_folder: DEFAULT_GENERAL_FOLDER.to_string(),
            other_folder: DEFAULT_OTHER_FOLDER.to_string(),
        }
    }
}

/// Immutable routing configuration.
///
/// Built once at startup and shared read-only by every routing call.
#[derive(Debug, Clone)]
pub struct RuleSet {
    types: TypeTable,
    categories: Vec<CategoryRule>,
    layout: Layout,
}

impl RuleSet {
    /// Assembles a rule set.
    ///
    /// # Errors
    ///
    /// Fails if a layout name is not a usable folder name, the other folder
    /// is named like a file type folder, two categories share a name, or a
    /// category is named like the general folder.
    pub fn new(
        types: TypeTable,
        categories: Vec<CategoryRule>,
        layout: Layout,
    ) -> Result<Self, RuleError> {
        for folder in [&layout.general_folder, &layout.other_folder] {
            if !is_valid_folder_name(folder) {
                return Err(RuleError::InvalidFolderName(folder.clone()));
            }
        }

        let other = layout.other_folder.to_lowercase();
        if FileType::ALL
            .iter()
            .any(|ft| *ft != FileType::Other && ft.label().to_lowercase() == other)
        {
            return Err(RuleError::OtherFolderCollides(layout.other_folder.clone()));
        }

        let general = layout.general_folder.to_lowercase();
        let mut names = HashSet::new();
        for category in &categories {
            let key = category.name.to_lowercase();
            if key == general {
                return Err(RuleError::ReservedCategoryName(category.name.clone()));
            }
            if !names.insert(key) {
                return Err(RuleError::DuplicateCategory(category.name.clone()));
            }
        }

        Ok(Self {
            types,
            categories,
            layout,
        })
    }

    /// Returns the first category with a keyword contained in `filename`.
    ///
    /// Matching is case-insensitive. Rules are tried in declaration order, so
    /// a filename matching several rules belongs to the earliest one. An empty
    /// filename, or one without any alphanumeric character, matches nothing.
    pub fn classify_category(&self, filename: &str) -> Option<&CategoryRule> {
        if !filename.chars().any(char::is_alphanumeric) {
            return None;
        }

        let lowercased = filename.to_lowercase();
        self.categories.iter().find(|rule| {
            if let Some(keyword) = rule.matching_keyword(&lowercased) {
                tracing::trace!(filename, category = %rule.name, keyword, "keyword match");
                true
            } else {
                false
            }
        })
    }

    /// Classifies an extension (with or without the leading dot).
    pub fn classify_type(&self, extension: &str) -> FileType {
        self.types.classify(extension)
    }

    /// The category rules, in evaluation order.
    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    /// Looks up a category by exact name.
    pub fn category(&self, name: &str) -> Option<&CategoryRule> {
        self.categories.iter().find(|rule| rule.name == name)
    }

    /// The folder for files that match no category.
    pub fn general_folder(&self) -> &str {
        &self.layout.general_folder
    }

    /// The folder name used for a file type; `Other` honors the layout.
    pub fn folder_label(&self, file_type: FileType) -> &str {
        match file_type {
            FileType::Other => &self.layout.other_folder,
            other => other.label(),
        }
    }

    /// The extension table.
    pub fn types(&self) -> &TypeTable {
        &self.types
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            types: TypeTable::default(),
            categories: default_categories(),
            layout: Layout::default(),
        }
    }
}

/// The built-in category rules used when no configuration supplies any.
pub fn default_categories() -> Vec<CategoryRule> {
    let everything = FileType::ALL
        .iter()
        .copied()
        .filter(|ft| !matches!(ft, FileType::Other))
        .collect::<Vec<_>>();

    [
        CategoryRule::new(
            "Work",
            [
                "meeting",
                "project",
                "client",
                "proposal",
                "floor plan",
                "elevation",
            ],
            everything,
        ),
        CategoryRule::new(
            "Screenshots",
            ["screenshot", "screen shot", "capture"],
            vec![FileType::Image],
        ),
        CategoryRule::new(
            "Timesheets",
            ["timesheet"],
            vec![FileType::Pdf, FileType::Spreadsheet],
        ),
    ]
    .into_iter()
    .filter_map(Result::ok)
    .collect()
}

/// Returns true if `name` can be used as a single path component.
pub(crate) fn is_valid_folder_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
