//! Top-K retrieval with pluggable ranking strategies.

use super::{with_timeout, RetrievedChunk, SearchMode};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{cosine_similarity, MetadataFilter, SearchResult, VectorStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chooses up to `k` chunks for an embedded query.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// The k nearest chunks by cosine similarity.
pub struct SimilarityStrategy;

#[async_trait]
impl RetrievalStrategy for SimilarityStrategy {
    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        let results = store.search(query_embedding, k, filter).await?;
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }
}

/// Maximal marginal relevance.
///
/// Fetches `fetch_multiplier * k` nearest candidates, then greedily picks the one
/// maximising `lambda * sim(q, d) - (1 - lambda) * max sim(d, selected)`.
/// Selected chunks keep their original query similarity as score.
#[derive(Debug, Clone, Copy)]
pub struct MmrStrategy {
    pub lambda: f32,
    pub fetch_multiplier: usize,
}

impl Default for MmrStrategy {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            fetch_multiplier: 2,
        }
    }
}

impl MmrStrategy {
    fn rerank(&self, candidates: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
        let mut remaining = candidates;
        let mut selected: Vec<SearchResult> = Vec::with_capacity(k.min(remaining.len()));

        while selected.len() < k && !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (idx, candidate) in remaining.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|s| cosine_similarity(&candidate.document.embedding, &s.document.embedding))
                    .fold(None, |acc: Option<f32>, sim| Some(acc.map_or(sim, |a| a.max(sim))))
                    .unwrap_or(0.0);

                let score = self.lambda * candidate.score - (1.0 - self.lambda) * redundancy;
                if score > best_score {
                    best_score = score;
                    best_idx = idx;
                }
            }

            selected.push(remaining.remove(best_idx));
        }

        selected
    }
}

#[async_trait]
impl RetrievalStrategy for MmrStrategy {
    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        let fetch = k.saturating_mul(self.fetch_multiplier.max(1));
        let candidates = store.search(query_embedding, fetch, filter).await?;
        debug!("MMR reranking {} candidates down to {}", candidates.len(), k);

        Ok(self
            .rerank(candidates, k)
            .into_iter()
            .map(RetrievedChunk::from)
            .collect())
    }
}

/// Embeds queries and runs the selected strategy against the store.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            timeout: Duration::from_secs(60),
        }
    }

    /// Deadline for the query embedding call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Fetch up to `k` chunks for `query`, best first.
    ///
    /// An empty collection returns no chunks without embedding the query.
    #[instrument(skip(self, filter), fields(mode = %mode))]
    pub async fn fetch(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.store.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = with_timeout(self.timeout, self.embedder.embed(query)).await?;
        let chunks = mode
            .strategy()
            .retrieve(self.store.as_ref(), &query_embedding, k, filter)
            .await?;

        debug!("Retrieved {} chunks", chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEmbedder;
    use crate::vector_store::{test_document, MemoryVectorStore};

    async fn store_with(docs: Vec<crate::vector_store::Document>) -> Arc<dyn VectorStore> {
        let store = MemoryVectorStore::new("test");
        store.upsert_batch(&docs).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_empty_collection_skips_embedding() {
        let embedder = Arc::new(FakeEmbedder::new(8));
        let retriever = Retriever::new(Arc::new(MemoryVectorStore::new("test")), embedder.clone());

        let chunks = retriever
            .fetch("annual leave", 4, SearchMode::Similarity, None)
            .await
            .unwrap();
        assert!(chunks.is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_similarity_orders_best_first() {
        let embedder = Arc::new(FakeEmbedder::new(32));
        let docs = vec![
            test_document("a.txt", None, "pension contributions", embedder.vector("pension contributions")),
            test_document("b.txt", None, "annual leave allowance", embedder.vector("annual leave allowance")),
            test_document("c.txt", None, "parking rules", embedder.vector("parking rules")),
        ];
        let retriever = Retriever::new(store_with(docs).await, embedder);

        let chunks = retriever
            .fetch("annual leave allowance", 2, SearchMode::Similarity, None)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk.source_file, "b.txt");
        assert!(chunks[0].relevance_score >= chunks[1].relevance_score);
    }

    #[test]
    fn test_mmr_prefers_diverse_candidates() {
        let result = |name: &str, score: f32, embedding: Vec<f32>| SearchResult {
            document: test_document(name, None, name, embedding),
            score,
        };
        let candidates = vec![
            result("first", 0.95, vec![1.0, 0.0]),
            result("duplicate", 0.94, vec![1.0, 0.0]),
            result("different", 0.60, vec![0.0, 1.0]),
        ];

        let picked = MmrStrategy::default().rerank(candidates, 2);
        let names: Vec<&str> = picked.iter().map(|r| r.document.chunk.source_file.as_str()).collect();
        assert_eq!(names, vec!["first", "different"]);
        assert!((picked[1].score - 0.60).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_mmr_returns_at_most_k() {
        let embedder = Arc::new(FakeEmbedder::new(16));
        let docs = (0..6)
            .map(|i| {
                let text = format!("leave rule {}", i);
                test_document(&format!("{}.txt", i), None, &text, embedder.vector(&text))
            })
            .collect();
        let retriever = Retriever::new(store_with(docs).await, embedder);

        let chunks = retriever.fetch("leave rule", 3, SearchMode::Mmr, None).await.unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_filter_restricts_candidates() {
        let embedder = Arc::new(FakeEmbedder::new(16));
        let docs = vec![
            test_document("leave.pdf", Some(1), "leave", embedder.vector("leave")),
            test_document("benefits.pdf", Some(1), "leave benefits", embedder.vector("leave benefits")),
        ];
        let retriever = Retriever::new(store_with(docs).await, embedder);

        let filter = MetadataFilter::source("benefits.pdf");
        let chunks = retriever
            .fetch("leave", 4, SearchMode::Similarity, Some(&filter))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk.source_file, "benefits.pdf");
    }
}
