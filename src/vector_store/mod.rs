//! Vector store abstraction for Handbook.
//!
//! Provides a trait-based interface for different vector database backends.
//! Every store is scoped to a single named collection.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::config::Settings;
use crate::error::{HandbookError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A chunk stored in the vector database together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// The chunk and its provenance.
    pub chunk: Chunk,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this chunk was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Restricts search candidates by chunk metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub source_file: Option<String>,
    pub category: Option<String>,
}

impl MetadataFilter {
    /// Filter on a single source file.
    pub fn source(source_file: impl Into<String>) -> Self {
        Self {
            source_file: Some(source_file.into()),
            category: None,
        }
    }

    /// True when the filter has no constraints.
    pub fn is_empty(&self) -> bool {
        self.source_file.is_none() && self.category.is_none()
    }

    /// Check whether a chunk passes the filter.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.source_file
            .as_deref()
            .map_or(true, |s| chunk.source_file == s)
            && self
                .category
                .as_deref()
                .map_or(true, |c| chunk.category == c)
    }
}

/// Summary information about an indexed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSource {
    /// File name.
    pub source_file: String,
    /// Policy category.
    pub category: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// Highest page number seen, if the source has pages.
    pub page_count: Option<u32>,
    /// When the source was last indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert documents.
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Search for the `limit` most similar documents, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Number of documents in the collection.
    async fn count(&self) -> Result<usize>;

    /// Delete every document in the collection.
    async fn delete_collection(&self) -> Result<usize>;

    /// Delete all documents from one source file.
    async fn delete_by_source(&self, source_file: &str) -> Result<usize>;

    /// Check if a source file has indexed documents.
    async fn is_source_indexed(&self, source_file: &str) -> Result<bool>;

    /// List indexed source files, sorted by name.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Name of the collection this store is scoped to.
    fn collection_name(&self) -> &str;
}

/// Create the vector store configured in settings.
pub fn create_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let collection = &settings.vector_store.collection_name;
    match settings.vector_store.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteVectorStore::new(
            &settings.sqlite_path(),
            collection,
        )?)),
        "memory" => Ok(Arc::new(MemoryVectorStore::new(collection))),
        other => Err(HandbookError::Config(format!(
            "Unknown vector store provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort results best first and keep the top `limit`.
pub(crate) fn rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
pub(crate) fn test_document(source_file: &str, page: Option<u32>, text: &str, embedding: Vec<f32>) -> Document {
    let page_meta = crate::document::DocumentPage::new(
        text.to_string(),
        std::path::Path::new(source_file),
        page,
    );
    Document::new(Chunk::new(text.to_string(), &page_meta.metadata, 0), embedding)
}
