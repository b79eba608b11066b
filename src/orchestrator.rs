//! The assistant boundary for Handbook.
//!
//! Wires loader, chunker, embedder, vector store and generator together and
//! exposes ingestion, status, search and answering to the CLI and HTTP API.

use crate::chunking::{Chunker, ChunkingConfig, RecursiveChunker};
use crate::config::{Prompts, Settings};
use crate::document::{list_documents, DocumentLoader, DocumentPage, FileLoader};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{HandbookError, Result};
use crate::generation::{GenerationBackend, OpenAIGenerator};
use crate::rag::sources::preview;
use crate::rag::{
    with_timeout, AnswerPipeline, AnswerResponse, ConversationExchange, KnowledgeBaseState,
    PipelineConfig, Retriever, SearchMode, Session,
};
use crate::vector_store::{create_store, Document, IndexedSource, MetadataFilter, VectorStore};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Files loaded at the same time during ingestion.
const LOAD_CONCURRENCY: usize = 4;

/// Characters of chunk text shown in search hits.
const SEARCH_PREVIEW_CHARS: usize = 300;

/// Chunks sent to the embedder per call during ingestion. Each call gets its own timeout.
const EMBED_BATCH_SIZE: usize = 100;

/// A file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFile {
    pub file: String,
    pub reason: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub success: bool,
    /// Chunks indexed by this run.
    pub chunk_count: usize,
    /// Files that produced chunks.
    pub source_file_count: usize,
    /// Files left alone because they were already indexed.
    pub skipped_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
}

impl IngestReport {
    fn finish(mut self) -> Self {
        self.success = self.failed_files.is_empty()
            && (self.chunk_count > 0 || !self.skipped_files.is_empty());
        self
    }
}

/// Snapshot of the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseStatus {
    pub is_ready: bool,
    pub chunk_count: usize,
    pub collection_name: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub sources: Vec<IndexedSource>,
}

/// A retrieval result without generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub source_file: String,
    pub page: String,
    pub category: String,
    pub score: f32,
}

/// The policy assistant.
pub struct Assistant {
    settings: Settings,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    pipeline: AnswerPipeline,
}

impl Assistant {
    /// Create an assistant backed by OpenAI and the configured vector store.
    pub async fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings)?);
        let generator: Arc<dyn GenerationBackend> = Arc::new(OpenAIGenerator::from_settings(&settings)?);
        let store = create_store(&settings)?;

        Self::with_components(
            settings,
            prompts,
            Arc::new(FileLoader::new()),
            embedder,
            store,
            generator,
        )
        .await
    }

    /// Create an assistant with custom components.
    ///
    /// The knowledge base starts ready if the store already holds chunks.
    pub async fn with_components(
        settings: Settings,
        prompts: Prompts,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationBackend>,
    ) -> Result<Self> {
        let chunker = Arc::new(RecursiveChunker::new(ChunkingConfig::try_from(
            &settings.chunking,
        )?));

        let config = PipelineConfig::from(&settings);
        let retriever = Retriever::new(store.clone(), embedder.clone())
            .with_timeout(config.request_timeout);
        let pipeline = AnswerPipeline::new(retriever, generator, prompts, config);
        pipeline.sync_state().await?;

        Ok(Self {
            settings,
            loader,
            chunker,
            embedder,
            store,
            pipeline,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.pipeline
    }

    /// Start a new conversation.
    pub fn new_session(&self) -> Session {
        Session::new(self.settings.memory.session_bound)
    }

    /// Start a conversation with a caller-chosen id.
    pub fn session_with_id(&self, id: &str) -> Session {
        Session::with_id(id, self.settings.memory.session_bound)
    }

    /// Ingest every supported document in `dir`.
    ///
    /// Already indexed files are skipped unless `force` is set, in which case
    /// their chunks are replaced.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn initialize(&self, dir: &Path, force: bool) -> Result<IngestReport> {
        let files = list_documents(dir)?;
        let mut state = self.pipeline.write_state().await;

        if files.is_empty() {
            warn!("No supported documents found in {}", dir.display());
        }

        let report = self.ingest(&mut state, files, force).await?;
        info!(
            "Initialized knowledge base: {} chunks from {} files",
            report.chunk_count, report.source_file_count
        );
        Ok(report)
    }

    /// Ingest a single file, replacing any chunks it already has.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn add_document(&self, path: &Path) -> Result<IngestReport> {
        let mut state = self.pipeline.write_state().await;
        self.ingest(&mut state, vec![path.to_path_buf()], true).await
    }

    /// Replace the whole collection with the documents in `dir`.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn update(&self, dir: &Path) -> Result<IngestReport> {
        let files = list_documents(dir)?;
        let mut state = self.pipeline.write_state().await;

        let deleted = self.store.delete_collection().await?;
        info!("Cleared {} chunks before update", deleted);
        *state = KnowledgeBaseState::default();

        self.ingest(&mut state, files, true).await
    }

    /// Delete the collection. Returns false if the store could not be cleared.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> bool {
        let mut state = self.pipeline.write_state().await;
        match self.store.delete_collection().await {
            Ok(deleted) => {
                *state = KnowledgeBaseState::default();
                info!("Knowledge base reset ({} chunks deleted)", deleted);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to reset knowledge base");
                false
            }
        }
    }

    pub async fn status(&self) -> Result<KnowledgeBaseStatus> {
        let state = self.pipeline.read_state().await;
        let chunk_count = self.store.count().await?;
        let sources = self.store.list_sources().await?;

        Ok(KnowledgeBaseStatus {
            is_ready: state.is_initialized,
            chunk_count,
            collection_name: self.store.collection_name().to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            generation_model: self.pipeline.generator().model_name().to_string(),
            sources,
        })
    }

    /// Retrieve matching passages without generating an answer.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        let chunks = self.pipeline.search(query, k, mode, filter).await?;
        Ok(chunks
            .into_iter()
            .map(|retrieved| SearchHit {
                content: preview(&retrieved.chunk.text, SEARCH_PREVIEW_CHARS),
                page: retrieved.chunk.page_label(),
                source_file: retrieved.chunk.source_file,
                category: retrieved.chunk.category,
                score: retrieved.relevance_score,
            })
            .collect())
    }

    /// Answer a question within `session`, optionally with a caller-supplied transcript.
    pub async fn answer(
        &self,
        session: &mut Session,
        question: &str,
        history: Option<&[ConversationExchange]>,
    ) -> AnswerResponse {
        self.pipeline.answer(session, question, history).await.into()
    }

    pub fn clear_history(&self, session: &mut Session) {
        session.memory.clear();
        info!(session = %session.id, "Conversation history cleared");
    }

    /// Load, chunk, embed and index `files`. The caller holds the state write lock.
    async fn ingest(
        &self,
        state: &mut KnowledgeBaseState,
        files: Vec<PathBuf>,
        force: bool,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut to_load = Vec::with_capacity(files.len());

        for path in files {
            let name = source_name(&path);
            if !force && self.store.is_source_indexed(&name).await? {
                info!("{} is already indexed, skipping", name);
                report.skipped_files.push(name);
            } else {
                to_load.push(path);
            }
        }

        let loaded: Vec<(PathBuf, Result<Vec<DocumentPage>>)> = stream::iter(to_load)
            .map(|path| async move {
                let result = self.loader.load(&path).await;
                (path, result)
            })
            .buffered(LOAD_CONCURRENCY)
            .collect()
            .await;

        let mut pages = Vec::new();
        let mut sources = Vec::new();

        for (path, result) in loaded {
            let name = source_name(&path);
            match result {
                Ok(file_pages) if file_pages.is_empty() => {
                    warn!("No text extracted from {}", path.display());
                    report.failed_files.push(FailedFile {
                        file: name,
                        reason: "no extractable text".to_string(),
                    });
                }
                Ok(file_pages) => {
                    sources.push(name);
                    pages.extend(file_pages);
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", path.display(), e);
                    report.failed_files.push(FailedFile {
                        file: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let chunks = self.chunker.split(&pages);
        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let timeout = self.pipeline.config().request_timeout;
            let mut embeddings = Vec::with_capacity(texts.len());
            for batch in texts.chunks(EMBED_BATCH_SIZE) {
                let batch_embeddings =
                    with_timeout(timeout, self.embedder.embed_batch(batch)).await?;
                embeddings.extend(batch_embeddings);
            }

            if embeddings.len() != chunks.len() {
                return Err(HandbookError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                )));
            }

            if force {
                for source in &sources {
                    self.store.delete_by_source(source).await?;
                }
            }

            report.chunk_count = chunks.len();
            let documents: Vec<Document> = chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| Document::new(chunk, embedding))
                .collect();
            self.store.upsert_batch(&documents).await?;
        }

        report.source_file_count = sources.len();
        *state = KnowledgeBaseState::with_chunks(self.store.count().await?);

        Ok(report.finish())
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::pipeline::NOT_READY_MESSAGE;
    use crate::testing::{FakeEmbedder, FakeGenerator};
    use crate::vector_store::MemoryVectorStore;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        assistant: Assistant,
        embedder: Arc<FakeEmbedder>,
        store: Arc<MemoryVectorStore>,
        docs: TempDir,
    }

    async fn fixture() -> Fixture {
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(
            docs.path().join("leave_policy.txt"),
            "Annual leave is 25 days per year.\n\nUnused leave can roll over up to 5 days.",
        )
        .unwrap();
        std::fs::write(
            docs.path().join("benefits.md"),
            "# Benefits\n\nDental insurance covers two checkups a year.",
        )
        .unwrap();
        std::fs::write(docs.path().join("notes.docx"), "ignored").unwrap();

        let embedder = Arc::new(FakeEmbedder::new(64));
        let store = Arc::new(MemoryVectorStore::new("hr_policies"));
        let assistant = Assistant::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(FileLoader::new()),
            embedder.clone(),
            store.clone(),
            Arc::new(FakeGenerator::new("Employees get 25 days of annual leave.")),
        )
        .await
        .unwrap();

        Fixture {
            assistant,
            embedder,
            store,
            docs,
        }
    }

    #[tokio::test]
    async fn test_initialize_then_answer() {
        let f = fixture().await;
        let mut session = f.assistant.new_session();

        let before = f
            .assistant
            .answer(&mut session, "How much annual leave do I get?", None)
            .await;
        assert_eq!(before.answer, NOT_READY_MESSAGE);

        let report = f.assistant.initialize(f.docs.path(), false).await.unwrap();
        assert!(report.success);
        assert_eq!(report.source_file_count, 2);
        assert_eq!(report.chunk_count, 2);
        assert!(report.failed_files.is_empty());

        let response = f
            .assistant
            .answer(&mut session, "How much annual leave do I get?", None)
            .await;
        assert_eq!(response.answer, "Employees get 25 days of annual leave.");
        assert_eq!(response.sources[0].file, "leave_policy.txt");
        assert_eq!(response.sources[0].page, "N/A");
        assert!(response.error.is_none());
        assert_eq!(session.memory.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_timeout_applies_per_embedding_batch() {
        let docs = tempfile::tempdir().unwrap();
        let clauses: Vec<String> = (0..250)
            .map(|i| format!("Policy clause {:04} covers annual leave.", i))
            .collect();
        std::fs::write(docs.path().join("handbook.txt"), clauses.join("\n\n")).unwrap();

        let mut settings = Settings::default();
        settings.openai.timeout_seconds = 1;
        settings.chunking.chunk_size = 50;
        settings.chunking.chunk_overlap = 0;

        // Each call fits the timeout, the whole run does not.
        let embedder = Arc::new(FakeEmbedder::new(64).with_delay(Duration::from_millis(400)));
        let store = Arc::new(MemoryVectorStore::new("hr_policies"));
        let assistant = Assistant::with_components(
            settings,
            Prompts::default(),
            Arc::new(FileLoader::new()),
            embedder.clone(),
            store.clone(),
            Arc::new(FakeGenerator::new("unused")),
        )
        .await
        .unwrap();

        let report = assistant.initialize(docs.path(), false).await.unwrap();
        assert!(report.success);
        assert!(report.chunk_count > 2 * EMBED_BATCH_SIZE);
        assert_eq!(
            embedder.calls(),
            report.chunk_count.div_ceil(EMBED_BATCH_SIZE)
        );
        assert_eq!(store.count().await.unwrap(), report.chunk_count);
    }

    #[tokio::test]
    async fn test_reinitialize_skips_unless_forced() {
        let f = fixture().await;
        f.assistant.initialize(f.docs.path(), false).await.unwrap();

        let again = f.assistant.initialize(f.docs.path(), false).await.unwrap();
        assert!(again.success);
        assert_eq!(again.chunk_count, 0);
        assert_eq!(again.skipped_files, vec!["benefits.md", "leave_policy.txt"]);
        assert_eq!(f.store.count().await.unwrap(), 2);

        let forced = f.assistant.initialize(f.docs.path(), true).await.unwrap();
        assert_eq!(forced.chunk_count, 2);
        assert_eq!(f.store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bad_files_are_reported_and_batch_continues() {
        let f = fixture().await;
        std::fs::write(f.docs.path().join("broken.pdf"), b"not a pdf").unwrap();
        std::fs::write(f.docs.path().join("empty.txt"), "   ").unwrap();

        let report = f.assistant.initialize(f.docs.path(), false).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.source_file_count, 2);
        let failed: Vec<&str> = report.failed_files.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(failed, vec!["broken.pdf", "empty.txt"]);

        let status = f.assistant.status().await.unwrap();
        assert!(status.is_ready);
    }

    #[tokio::test]
    async fn test_add_document_failures() {
        let f = fixture().await;

        let missing = f
            .assistant
            .add_document(&f.docs.path().join("missing.pdf"))
            .await
            .unwrap();
        assert!(!missing.success);
        assert_eq!(missing.failed_files.len(), 1);

        let unsupported = f
            .assistant
            .add_document(&f.docs.path().join("notes.docx"))
            .await
            .unwrap();
        assert!(!unsupported.success);
        assert!(!f.assistant.status().await.unwrap().is_ready);
    }

    #[tokio::test]
    async fn test_add_document_makes_ready_and_replaces() {
        let f = fixture().await;
        let path = f.docs.path().join("leave_policy.txt");

        let first = f.assistant.add_document(&path).await.unwrap();
        assert!(first.success);
        assert!(f.assistant.status().await.unwrap().is_ready);

        f.assistant.add_document(&path).await.unwrap();
        assert_eq!(f.store.count().await.unwrap(), first.chunk_count);
    }

    #[tokio::test]
    async fn test_reset_returns_to_not_ready() {
        let f = fixture().await;
        f.assistant.initialize(f.docs.path(), false).await.unwrap();

        assert!(f.assistant.reset().await);
        let status = f.assistant.status().await.unwrap();
        assert!(!status.is_ready);
        assert_eq!(status.chunk_count, 0);

        let response = f
            .assistant
            .answer(&mut f.assistant.new_session(), "How much annual leave?", None)
            .await;
        assert_eq!(response.error.as_deref(), Some("System not initialized"));
    }

    #[tokio::test]
    async fn test_update_replaces_collection() {
        let f = fixture().await;
        f.assistant.initialize(f.docs.path(), false).await.unwrap();

        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("conduct.txt"), "Be kind to colleagues.").unwrap();

        let report = f.assistant.update(other.path()).await.unwrap();
        assert!(report.success);

        let status = f.assistant.status().await.unwrap();
        assert_eq!(status.chunk_count, 1);
        assert_eq!(status.sources.len(), 1);
        assert_eq!(status.sources[0].category, "Code of Conduct");
    }

    #[tokio::test]
    async fn test_status_reports_models_and_sources() {
        let f = fixture().await;
        f.assistant.initialize(f.docs.path(), false).await.unwrap();

        let status = f.assistant.status().await.unwrap();
        assert!(status.is_ready);
        assert_eq!(status.collection_name, "hr_policies");
        assert_eq!(status.embedding_model, "fake-embedding");
        assert_eq!(status.generation_model, "fake-chat");
        let names: Vec<&str> = status.sources.iter().map(|s| s.source_file.as_str()).collect();
        assert_eq!(names, vec!["benefits.md", "leave_policy.txt"]);
    }

    #[tokio::test]
    async fn test_search_hits() {
        let f = fixture().await;
        assert!(f
            .assistant
            .search("dental", 5, SearchMode::Similarity, None)
            .await
            .unwrap()
            .is_empty());

        f.assistant.initialize(f.docs.path(), false).await.unwrap();
        let hits = f
            .assistant
            .search("dental insurance checkups", 1, SearchMode::Similarity, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_file, "benefits.md");
        assert_eq!(hits[0].category, "Benefits");

        let filter = MetadataFilter::source("leave_policy.txt");
        let filtered = f
            .assistant
            .search("dental", 5, SearchMode::Mmr, Some(&filter))
            .await
            .unwrap();
        assert!(filtered.iter().all(|h| h.source_file == "leave_policy.txt"));
    }

    #[tokio::test]
    async fn test_persisted_collection_starts_ready() {
        let f = fixture().await;
        f.assistant.initialize(f.docs.path(), false).await.unwrap();

        let reopened = Assistant::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(FileLoader::new()),
            f.embedder.clone(),
            f.store.clone(),
            Arc::new(FakeGenerator::new("answer")),
        )
        .await
        .unwrap();
        assert!(reopened.status().await.unwrap().is_ready);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let f = fixture().await;
        f.assistant.initialize(f.docs.path(), false).await.unwrap();
        let mut session = f.assistant.new_session();
        f.assistant
            .answer(&mut session, "How much annual leave?", None)
            .await;
        assert_eq!(session.memory.len(), 1);

        f.assistant.clear_history(&mut session);
        assert!(session.memory.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let f = fixture().await;
        let result = f.assistant.initialize(Path::new("/no/such/dir"), false).await;
        assert!(matches!(result, Err(HandbookError::NotFound(_))));
    }
}
