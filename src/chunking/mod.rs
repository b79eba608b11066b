//! Content chunking for breaking document pages into searchable segments.
//!
//! Pages are split into overlapping, size-bounded windows that keep their provenance.

mod recursive;

pub use recursive::RecursiveChunker;

use crate::config::ChunkingSettings;
use crate::document::{DocumentPage, PageMetadata};
use crate::error::{HandbookError, Result};
use serde::{Deserialize, Serialize};

/// A chunk of text from a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of this chunk.
    pub text: String,
    /// File name the chunk came from.
    pub source_file: String,
    /// Full path the file was loaded from.
    pub file_path: String,
    /// Policy category of the source file.
    pub category: String,
    /// 1-based page number, if the source has pages.
    pub page_number: Option<u32>,
    /// Position of this chunk within its ingestion batch.
    pub chunk_index: usize,
    /// Length of `text` in characters.
    pub chunk_length: usize,
}

impl Chunk {
    /// Create a chunk carrying the metadata of its parent page.
    pub fn new(text: String, metadata: &PageMetadata, chunk_index: usize) -> Self {
        let chunk_length = text.chars().count();
        Self {
            text,
            source_file: metadata.source_file.clone(),
            file_path: metadata.file_path.clone(),
            category: metadata.category.clone(),
            page_number: metadata.page_number,
            chunk_index,
            chunk_length,
        }
    }

    /// Page label for display ("N/A" when the source has no pages).
    pub fn page_label(&self) -> String {
        self.page_number
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters carried over between adjacent chunks.
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Create a validated configuration.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(HandbookError::Config("chunk size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(HandbookError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl TryFrom<&ChunkingSettings> for ChunkingConfig {
    type Error = HandbookError;

    fn try_from(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }
}

/// Trait for chunking implementations.
pub trait Chunker: Send + Sync {
    /// Split an ordered batch of pages into chunks.
    ///
    /// `chunk_index` is assigned across the whole batch in document order.
    fn split(&self, pages: &[DocumentPage]) -> Vec<Chunk>;
}
