//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, rank, Document, IndexedSource, MetadataFilter, SearchResult, VectorStore};
use crate::error::{HandbookError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    collection: String,
    documents: RwLock<Vec<Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store for `collection`.
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            documents: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Document>>> {
        self.documents
            .read()
            .map_err(|e| HandbookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents
            .write()
            .map_err(|e| HandbookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        for doc in docs {
            match store.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc.clone(),
                None => store.push(doc.clone()),
            }
        }
        Ok(docs.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let docs = self.read()?;

        let results: Vec<SearchResult> = docs
            .iter()
            .filter(|doc| filter.map_or(true, |f| f.matches(&doc.chunk)))
            .map(|doc| SearchResult {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        Ok(rank(results, limit))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn delete_collection(&self) -> Result<usize> {
        let mut docs = self.write()?;
        let deleted = docs.len();
        docs.clear();
        Ok(deleted)
    }

    async fn delete_by_source(&self, source_file: &str) -> Result<usize> {
        let mut docs = self.write()?;
        let initial_len = docs.len();
        docs.retain(|doc| doc.chunk.source_file != source_file);
        Ok(initial_len - docs.len())
    }

    async fn is_source_indexed(&self, source_file: &str) -> Result<bool> {
        Ok(self.read()?.iter().any(|d| d.chunk.source_file == source_file))
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let docs = self.read()?;
        let mut sources: BTreeMap<String, IndexedSource> = BTreeMap::new();

        for doc in docs.iter() {
            let entry = sources
                .entry(doc.chunk.source_file.clone())
                .or_insert_with(|| IndexedSource {
                    source_file: doc.chunk.source_file.clone(),
                    category: doc.chunk.category.clone(),
                    chunk_count: 0,
                    page_count: None,
                    indexed_at: doc.indexed_at,
                });

            entry.chunk_count += 1;
            entry.page_count = entry.page_count.max(doc.chunk.page_number);
            if doc.indexed_at > entry.indexed_at {
                entry.indexed_at = doc.indexed_at;
            }
        }

        Ok(sources.into_values().collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_document;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new("hr_policies");

        let docs = vec![
            test_document("leave.pdf", Some(1), "Annual leave", vec![1.0, 0.0, 0.0]),
            test_document("leave.pdf", Some(4), "Sick leave", vec![0.8, 0.2, 0.0]),
            test_document("benefits.txt", None, "Dental plan", vec![0.0, 1.0, 0.0]),
        ];
        assert_eq!(store.upsert_batch(&docs).await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.chunk.text, "Annual leave");
        assert!(results[0].score >= results[1].score);

        let filter = MetadataFilter::source("benefits.txt");
        let filtered = store.search(&[1.0, 0.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].document.chunk.source_file, "benefits.txt");

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_file, "benefits.txt");
        assert_eq!(sources[1].chunk_count, 2);
        assert_eq!(sources[1].page_count, Some(4));

        assert!(store.is_source_indexed("leave.pdf").await.unwrap());
        assert_eq!(store.delete_by_source("leave.pdf").await.unwrap(), 2);
        assert!(!store.is_source_indexed("leave.pdf").await.unwrap());

        assert_eq!(store.delete_collection().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryVectorStore::new("c");
        let mut doc = test_document("a.txt", None, "old", vec![1.0]);
        store.upsert_batch(std::slice::from_ref(&doc)).await.unwrap();

        doc.chunk.text = "new".to_string();
        store.upsert_batch(std::slice::from_ref(&doc)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&[1.0], 1, None).await.unwrap();
        assert_eq!(results[0].document.chunk.text, "new");
    }
}
