//! Retrieval-augmented answering over indexed policy documents.
//!
//! A question is validated, matched against the vector store, packed into a
//! bounded context together with recent conversation history, and answered by
//! the generation backend with deduplicated source citations.

pub mod context;
pub mod memory;
pub mod pipeline;
pub mod retriever;
pub mod sources;
pub mod validation;

pub use context::pack;
pub use memory::{render_history, ConversationExchange, ConversationMemory, Session};
pub use pipeline::{AnswerOutcome, AnswerPipeline, AnswerResponse, KnowledgeBaseState, PipelineConfig};
pub use retriever::{MmrStrategy, RetrievalStrategy, Retriever, SimilarityStrategy};
pub use sources::{extract_sources, Source};
pub use validation::{DefaultQuestionPolicy, QuestionPolicy, Validation};

use crate::chunking::Chunk;
use crate::error::{HandbookError, Result};
use crate::vector_store::SearchResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// How candidates are chosen from the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Plain nearest neighbours by cosine similarity.
    #[default]
    Similarity,
    /// Maximal marginal relevance: nearest neighbours reranked for diversity.
    Mmr,
}

impl SearchMode {
    /// Strategy implementing this mode.
    pub fn strategy(self) -> Box<dyn RetrievalStrategy> {
        match self {
            SearchMode::Similarity => Box::new(SimilarityStrategy),
            SearchMode::Mmr => Box::new(MmrStrategy::default()),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Similarity => write!(f, "similarity"),
            SearchMode::Mmr => write!(f, "mmr"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = HandbookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "similarity" => Ok(SearchMode::Similarity),
            "mmr" => Ok(SearchMode::Mmr),
            other => Err(HandbookError::InvalidInput(format!(
                "Unknown search mode: {} (expected similarity or mmr)",
                other
            ))),
        }
    }
}

/// A chunk returned by retrieval with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Higher is better.
    pub relevance_score: f32,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            chunk: result.document.chunk,
            relevance_score: result.score,
        }
    }
}

/// Run an external call with a deadline.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| HandbookError::Timeout(limit.as_secs()))?
}
