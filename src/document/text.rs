//! Plain text and Markdown loader.

use super::{clean_text, DocumentLoader, DocumentPage};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Loads a UTF-8 text file as a single page.
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let text = clean_text(&raw);

        if text.is_empty() {
            debug!("{} has no text content", path.display());
            return Ok(Vec::new());
        }

        Ok(vec![DocumentPage::new(text, path, None)])
    }
}
