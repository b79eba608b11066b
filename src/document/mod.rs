//! Document loading for policy files.
//!
//! Provides a trait-based interface for turning files on disk into ordered pages.

mod pdf;
mod text;

pub use pdf::PdfLoader;
pub use text::TextLoader;

use crate::error::{HandbookError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Supported document extensions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Provenance attached to every page of a loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// File name without directory.
    pub source_file: String,
    /// Path the file was loaded from.
    pub file_path: String,
    /// 1-based page number, `None` for formats without pages.
    pub page_number: Option<u32>,
    /// Policy category derived from the file name.
    pub category: String,
}

/// A single page of text from a loaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub text: String,
    pub metadata: PageMetadata,
}

impl DocumentPage {
    /// Create a page for `path`.
    pub fn new(text: String, path: &Path, page_number: Option<u32>) -> Self {
        let source_file = file_name(path);
        let category = category_for(&source_file).to_string();
        Self {
            text,
            metadata: PageMetadata {
                source_file,
                file_path: path.display().to_string(),
                page_number,
                category,
            },
        }
    }
}

/// Trait for document loaders.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load a file into ordered pages.
    async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>>;
}

/// Loader that dispatches on file extension.
pub struct FileLoader {
    pdf: PdfLoader,
    text: TextLoader,
}

impl FileLoader {
    pub fn new() -> Self {
        Self {
            pdf: PdfLoader::new(),
            text: TextLoader::new(),
        }
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>> {
        if !path.exists() {
            return Err(HandbookError::NotFound(path.display().to_string()));
        }
        if !path.is_file() {
            return Err(HandbookError::InvalidInput(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        match extension(path).as_deref() {
            Some("pdf") => self.pdf.load(path).await,
            Some("txt") | Some("md") => self.text.load(path).await,
            other => Err(HandbookError::UnsupportedFormat(format!(
                "{} (.{}); supported types: {}",
                path.display(),
                other.unwrap_or(""),
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }
}

/// Check if path has a supported document extension.
pub fn is_supported(path: &Path) -> bool {
    extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// List supported documents directly inside `dir`, sorted by file name.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(HandbookError::NotFound(dir.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Strip extraction artifacts from page text.
pub fn clean_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{f0b7}', "•")
        .trim()
        .to_string()
}

/// Derive a policy category from a file name.
pub fn category_for(file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| name.contains(w));

    if has_any(&["leave", "vacation", "pto"]) {
        "Leave Policies"
    } else if has_any(&["benefit", "insurance", "health"]) {
        "Benefits"
    } else if has_any(&["conduct", "ethics", "compliance"]) {
        "Code of Conduct"
    } else if has_any(&["training", "development"]) {
        "Training & Development"
    } else if has_any(&["performance", "review", "evaluation"]) {
        "Performance Management"
    } else {
        "General HR"
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
