//! File type classification by extension.
//!
//! This module maps file extensions to a fixed set of [`FileType`] tags. Each
//! tag doubles as the name of the subfolder files of that type are routed into
//! (e.g. `Images`, `PDFs`, `Text Files`).
//!
//! # Examples
//!
//! ```
//! use dropsort::file_type::{FileType, TypeTable};
//!
//! let table = TypeTable::default();
//! assert_eq!(table.classify(".png"), FileType::Image);
//! assert_eq!(table.classify("PDF"), FileType::Pdf);
//! assert_eq!(table.classify(".unknown"), FileType::Other);
//! ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The type of a file, derived solely from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Image files (PNG, JPG, GIF, etc.)
    #[serde(rename = "Images", alias = "Image")]
    Image,
    /// PDF documents
    #[serde(rename = "PDFs", alias = "PDF")]
    Pdf,
    /// Word processor documents (DOC, DOCX)
    #[serde(rename = "Documents", alias = "Document")]
    Document,
    /// Spreadsheet files (XLSX, XLS, CSV)
    #[serde(rename = "Spreadsheets", alias = "Spreadsheet")]
    Spreadsheet,
    /// Presentation files (PPT, PPTX)
    #[serde(rename = "Presentations", alias = "Presentation")]
    Presentation,
    /// Plain text files
    #[serde(rename = "Text Files", alias = "Text")]
    Text,
    /// Video files (MP4, MKV, MOV, etc.)
    #[serde(rename = "Videos", alias = "Video")]
    Video,
    /// Audio files (MP3, WAV, FLAC, etc.)
    #[serde(rename = "Audio")]
    Audio,
    /// Archive files (ZIP, RAR, 7Z, etc.)
    #[serde(rename = "Archives", alias = "Archive")]
    Archive,
    /// Source code and structured data files
    #[serde(rename = "Code")]
    Code,
    /// Installer packages (EXE, DMG, DEB, etc.)
    #[serde(rename = "Installers", alias = "Installer")]
    Installer,
    /// Revit models and families
    #[serde(rename = "Revit Files", alias = "Revit")]
    Revit,
    /// CAD drawings and meshes
    #[serde(rename = "CAD Files", alias = "CAD")]
    Cad,
    /// Anything the extension table does not recognize
    #[serde(rename = "Other")]
    Other,
}

impl FileType {
    /// Every file type, in the order the `General` tree lists them.
    pub const ALL: [FileType; 14] = [
        FileType::Image,
        FileType::Pdf,
        FileType::Document,
        FileType::Spreadsheet,
        FileType::Presentation,
        FileType::Text,
        FileType::Video,
        FileType::Audio,
        FileType::Archive,
        FileType::Code,
        FileType::Installer,
        FileType::Revit,
        FileType::Cad,
        FileType::Other,
    ];

    /// Returns the subfolder label for this file type.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropsort::file_type::FileType;
    ///
    /// assert_eq!(FileType::Image.label(), "Images");
    /// assert_eq!(FileType::Pdf.label(), "PDFs");
    /// assert_eq!(FileType::Text.label(), "Text Files");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            FileType::Image => "Images",
            FileType::Pdf => "PDFs",
            FileType::Document => "Documents",
            FileType::Spreadsheet => "Spreadsheets",
            FileType::Presentation => "Presentations",
            FileType::Text => "Text Files",
            FileType::Video => "Videos",
            FileType::Audio => "Audio",
            FileType::Archive => "Archives",
            FileType::Code => "Code",
            FileType::Installer => "Installers",
            FileType::Revit => "Revit Files",
            FileType::Cad => "CAD Files",
            FileType::Other => "Other",
        }
    }

    /// Returns true for the types a category may collapse into `Documents`.
    pub fn is_office_document(&self) -> bool {
        matches!(
            self,
            FileType::Pdf
                | FileType::Document
                | FileType::Spreadsheet
                | FileType::Presentation
                | FileType::Text
        )
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps file extensions to file types.
///
/// Lookups are case-insensitive and accept extensions with or without the
/// leading dot. When an extension is registered twice, the first mapping wins.
#[derive(Debug, Clone)]
pub struct TypeTable {
    extension_map: HashMap<String, FileType>,
}

impl TypeTable {
    /// Creates a table with no mappings; every lookup yields `Other`.
    pub fn empty() -> Self {
        Self {
            extension_map: HashMap::new(),
        }
    }

    /// Creates a table with the standard extension mappings.
    pub fn new() -> Self {
        let mut table = Self::empty();
        for (file_type, extensions) in STANDARD_EXTENSIONS {
            for ext in *extensions {
                table.add_extension_mapping(ext, *file_type);
            }
        }
        table
    }

    /// Adds an extension mapping unless the extension is already mapped.
    pub fn add_extension_mapping(&mut self, ext: &str, file_type: FileType) {
        let key = normalize_extension(ext);
        if key.is_empty() {
            return;
        }
        self.extension_map.entry(key).or_insert(file_type);
    }

    /// Classifies an extension, falling back to `Other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropsort::file_type::{FileType, TypeTable};
    ///
    /// let table = TypeTable::default();
    /// assert_eq!(table.classify(".JPEG"), FileType::Image);
    /// assert_eq!(table.classify(""), FileType::Other);
    /// ```
    pub fn classify(&self, ext: &str) -> FileType {
        self.extension_map
            .get(&normalize_extension(ext))
            .copied()
            .unwrap_or(FileType::Other)
    }

    /// Returns the number of registered extensions.
    pub fn len(&self) -> usize {
        self.extension_map.len()
    }

    /// Returns true if no extension is registered.
    pub fn is_empty(&self) -> bool {
        self.extension_map.is_empty()
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    ext.to_lowercase()
}

const STANDARD_EXTENSIONS: &[(FileType, &[&str])] = &[
    (
        FileType::Image,
        &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp"],
    ),
    (FileType::Pdf, &[".pdf"]),
    (FileType::Document, &[".doc", ".docx"]),
    (FileType::Spreadsheet, &[".xlsx", ".xls", ".csv"]),
    (FileType::Presentation, &[".ppt", ".pptx"]),
    (FileType::Text, &[".txt"]),
    (
        FileType::Video,
        &[".mp4", ".avi", ".mov", ".mkv", ".flv", ".wmv"],
    ),
    (FileType::Audio, &[".mp3", ".wav", ".flac", ".aac", ".ogg"]),
    (FileType::Archive, &[".zip", ".rar", ".7z", ".tar", ".gz"]),
    (
        FileType::Code,
        &[".py", ".js", ".html", ".css", ".java", ".cpp", ".json"],
    ),
    (
        FileType::Installer,
        &[".exe", ".dmg", ".pkg", ".deb", ".msi"],
    ),
    (FileType::Revit, &[".rvt", ".rfa"]),
    (FileType::Cad, &[".dwg", ".bak", ".pcp", ".stl"]),
];

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(FileType::Image.label(), "Images");
        assert_eq!(FileType::Pdf.label(), "PDFs");
        assert_eq!(FileType::Document.label(), "Documents");
        assert_eq!(FileType::Text.label(), "Text Files");
        assert_eq!(FileType::Revit.label(), "Revit Files");
        assert_eq!(FileType::Cad.label(), "CAD Files");
        assert_eq!(FileType::Other.label(), "Other");
    }

    #[test]
    fn test_office_documents() {
        assert!(FileType::Pdf.is_office_document());
        assert!(FileType::Text.is_office_document());
        assert!(FileType::Spreadsheet.is_office_document());
        assert!(!FileType::Image.is_office_document());
        assert!(!FileType::Other.is_office_document());
    }

    #[test]
    fn test_classify_standard_table() {
        let table = TypeTable::new();
        assert_eq!(table.classify(".png"), FileType::Image);
        assert_eq!(table.classify(".pdf"), FileType::Pdf);
        assert_eq!(table.classify(".docx"), FileType::Document);
        assert_eq!(table.classify(".csv"), FileType::Spreadsheet);
        assert_eq!(table.classify(".mkv"), FileType::Video);
        assert_eq!(table.classify(".rvt"), FileType::Revit);
        assert_eq!(table.classify(".dwg"), FileType::Cad);
    }

    #[test]
    fn test_classify_case_insensitive_and_dotless() {
        let table = TypeTable::new();
        assert_eq!(table.classify(".PNG"), FileType::Image);
        assert_eq!(table.classify("Mp3"), FileType::Audio);
        assert_eq!(table.classify("pdf"), FileType::Pdf);
    }

    #[test]
    fn test_classify_unknown_is_other() {
        let table = TypeTable::new();
        assert_eq!(table.classify(""), FileType::Other);
        assert_eq!(table.classify("."), FileType::Other);
        assert_eq!(table.classify(".xyz"), FileType::Other);
    }

    #[test]
    fn test_every_standard_extension_resolves() {
        let table = TypeTable::new();
        for (file_type, extensions) in STANDARD_EXTENSIONS {
            for ext in *extensions {
                assert_eq!(table.classify(ext), *file_type, "extension {}", ext);
                assert_eq!(
                    table.classify(&ext.to_uppercase()),
                    *file_type,
                    "extension {}",
                    ext
                );
            }
        }
    }

    #[test]
    fn test_first_mapping_wins() {
        let mut table = TypeTable::empty();
        table.add_extension_mapping(".bak", FileType::Cad);
        table.add_extension_mapping("BAK", FileType::Archive);
        assert_eq!(table.classify(".bak"), FileType::Cad);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let table = TypeTable::empty();
        assert!(table.is_empty());
        assert_eq!(table.classify(".png"), FileType::Other);
    }

    #[test]
    fn test_deserialize_labels() {
        #[derive(Deserialize)]
        struct Wrapper {
            types: Vec<FileType>,
        }
        let parsed: Wrapper =
            toml::from_str(r#"types = ["Images", "PDFs", "Text Files", "CAD Files", "Other"]"#)
                .unwrap();
        assert_eq!(
            parsed.types,
            vec![
                FileType::Image,
                FileType::Pdf,
                FileType::Text,
                FileType::Cad,
                FileType::Other
            ]
        );
    }
}
