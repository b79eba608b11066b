//! PDF loader built on `pdf-extract`.

use super::{clean_text, DocumentLoader, DocumentPage};
use crate::error::{HandbookError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Loads a PDF into one page per PDF page.
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }

    /// Build pages from extracted per-page text, dropping pages with no text.
    fn build_pages(raw_pages: Vec<String>, path: &Path) -> Vec<DocumentPage> {
        raw_pages
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let text = clean_text(&raw);
                if text.is_empty() {
                    None
                } else {
                    Some(DocumentPage::new(text, path, Some(i as u32 + 1)))
                }
            })
            .collect()
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>> {
        let bytes = tokio::fs::read(path).await?;

        // Extraction is CPU-bound and may panic on malformed files.
        let raw_pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| HandbookError::Extraction(format!("{}: {}", path.display(), e)))?
        .map_err(|e| HandbookError::Extraction(format!("{}: {}", path.display(), e)))?;

        debug!("Extracted {} raw pages", raw_pages.len());

        let pages = Self::build_pages(raw_pages, path);
        info!("Loaded {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}
