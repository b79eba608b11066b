//! The answer pipeline and its knowledge-base state machine.

use super::context::pack;
use super::memory::{render_history, ConversationExchange, ConversationMemory, Session};
use super::retriever::Retriever;
use super::sources::{extract_sources, Source};
use super::validation::{DefaultQuestionPolicy, QuestionPolicy, Validation};
use super::{with_timeout, RetrievedChunk, SearchMode};
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::generation::GenerationBackend;
use crate::vector_store::MetadataFilter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument, warn};

pub const NOT_READY_MESSAGE: &str =
    "The assistant is not ready yet. Please ensure the policy documents have been loaded.";

pub const NO_RESULTS_MESSAGE: &str = "I couldn't find relevant information in the policy documents to answer your question. Please try rephrasing your question or contact HR directly for assistance.";

pub const TECHNICAL_DIFFICULTIES_MESSAGE: &str = "I apologize, but I'm experiencing technical difficulties at the moment. Please try rephrasing your question or contact the HR department directly for immediate assistance.";

/// Whether the collection holds anything to answer from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseState {
    pub is_initialized: bool,
    pub document_chunk_count: usize,
}

impl KnowledgeBaseState {
    /// State for a collection holding `chunk_count` chunks.
    pub fn with_chunks(chunk_count: usize) -> Self {
        Self {
            is_initialized: chunk_count > 0,
            document_chunk_count: chunk_count,
        }
    }
}

/// Tunables of the answer flow.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_retrieval_docs: usize,
    pub max_context_chars: usize,
    pub search_mode: SearchMode,
    /// Session exchanges rendered into the prompt.
    pub prompt_window: usize,
    /// Exchanges kept from a caller-supplied transcript.
    pub request_bound: usize,
    /// Deadline for each external call.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retrieval_docs: 4,
            max_context_chars: 4000,
            search_mode: SearchMode::Similarity,
            prompt_window: 3,
            request_bound: 5,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_retrieval_docs: settings.retrieval.max_retrieval_docs,
            max_context_chars: settings.retrieval.max_context_chars,
            search_mode: settings.retrieval.search_mode,
            prompt_window: settings.memory.prompt_window,
            request_bound: settings.memory.request_bound,
            request_timeout: Duration::from_secs(settings.openai.timeout_seconds),
        }
    }
}

/// What happened to a question.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Answered { answer: String, sources: Vec<Source> },
    /// Nothing has been ingested yet.
    NotReady { message: String },
    /// The question failed validation.
    Rejected { message: String },
    /// Retrieval found no chunks.
    NoResults { message: String },
    /// Embedding, retrieval or generation failed or timed out.
    BackendFailure { message: String },
}

impl AnswerOutcome {
    /// Text shown to the user.
    pub fn answer_text(&self) -> &str {
        match self {
            AnswerOutcome::Answered { answer, .. } => answer,
            AnswerOutcome::NotReady { message }
            | AnswerOutcome::Rejected { message }
            | AnswerOutcome::NoResults { message }
            | AnswerOutcome::BackendFailure { message } => message,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, AnswerOutcome::Answered { .. })
    }
}

/// Answer payload returned across the library boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        let (answer, sources, warning, error) = match outcome {
            AnswerOutcome::Answered { answer, sources } => (answer, sources, None, None),
            AnswerOutcome::NotReady { message } => {
                (message, Vec::new(), None, Some("System not initialized"))
            }
            AnswerOutcome::Rejected { message } => {
                (message, Vec::new(), None, Some("Invalid question"))
            }
            AnswerOutcome::NoResults { message } => (
                message,
                Vec::new(),
                Some("No relevant documents found".to_string()),
                None,
            ),
            AnswerOutcome::BackendFailure { message } => {
                (message, Vec::new(), None, Some("Backend unavailable"))
            }
        };

        Self {
            answer,
            sources,
            warning,
            error: error.map(str::to_string),
        }
    }
}

/// Validates, retrieves, packs context, generates and cites.
pub struct AnswerPipeline {
    state: RwLock<KnowledgeBaseState>,
    retriever: Retriever,
    generator: Arc<dyn GenerationBackend>,
    policy: Arc<dyn QuestionPolicy>,
    prompts: Prompts,
    config: PipelineConfig,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn GenerationBackend>,
        prompts: Prompts,
        config: PipelineConfig,
    ) -> Self {
        Self {
            state: RwLock::new(KnowledgeBaseState::default()),
            retriever,
            generator,
            policy: Arc::new(DefaultQuestionPolicy),
            prompts,
            config,
        }
    }

    /// Replace the question policy.
    pub fn with_policy(mut self, policy: Arc<dyn QuestionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &Arc<dyn GenerationBackend> {
        &self.generator
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shared access to the state; held by answer and search.
    pub async fn read_state(&self) -> RwLockReadGuard<'_, KnowledgeBaseState> {
        self.state.read().await
    }

    /// Exclusive access to the state; held by ingest, update and reset.
    pub async fn write_state(&self) -> RwLockWriteGuard<'_, KnowledgeBaseState> {
        self.state.write().await
    }

    /// Derive the state from what the store already holds.
    pub async fn sync_state(&self) -> Result<KnowledgeBaseState> {
        let mut state = self.state.write().await;
        let count = self.retriever.store().count().await?;
        *state = KnowledgeBaseState::with_chunks(count);
        if state.is_initialized {
            info!("Opened collection with {} chunks", count);
        }
        Ok(*state)
    }

    /// Answer a question within a session.
    ///
    /// A transcript passed as `external_history` replaces the session history for
    /// the prompt and is never written to. Only answered questions are recorded.
    #[instrument(skip(self, session, external_history), fields(session = %session.id))]
    pub async fn answer(
        &self,
        session: &mut Session,
        question: &str,
        external_history: Option<&[ConversationExchange]>,
    ) -> AnswerOutcome {
        let state = self.state.read().await;
        if !state.is_initialized {
            return AnswerOutcome::NotReady {
                message: NOT_READY_MESSAGE.to_string(),
            };
        }

        let reminder = match self.policy.validate(question) {
            Validation::Rejected(message) => {
                debug!("Question rejected");
                return AnswerOutcome::Rejected { message };
            }
            Validation::AcceptedWithReminder(reminder) => Some(reminder),
            Validation::Accepted => None,
        };

        let chunks = match self
            .retriever
            .fetch(
                question,
                self.config.max_retrieval_docs,
                self.config.search_mode,
                None,
            )
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Retrieval failed");
                return technical_difficulties();
            }
        };

        if chunks.is_empty() {
            return AnswerOutcome::NoResults {
                message: NO_RESULTS_MESSAGE.to_string(),
            };
        }

        let history = match external_history {
            Some(transcript) => ConversationMemory::from_transcript(transcript, self.config.request_bound)
                .window(self.config.request_bound),
            None => session.memory.window(self.config.prompt_window),
        };

        let mut context = pack(&chunks, self.config.max_context_chars);
        context.push_str(&render_history(&history));

        let system = self.prompts.system_prompt();
        let user = self.prompts.user_prompt(question, &context);

        let generated = match with_timeout(
            self.config.request_timeout,
            self.generator.complete(&system, &user),
        )
        .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Generation failed");
                return technical_difficulties();
            }
        };

        let answer = match reminder {
            Some(reminder) => format!("{}\n\n{}", reminder, generated),
            None => generated,
        };
        let sources = extract_sources(&chunks);

        session
            .memory
            .append(ConversationExchange::new(question, answer.clone()));

        info!(
            chunks = chunks.len(),
            sources = sources.len(),
            "Answered question"
        );
        AnswerOutcome::Answered { answer, sources }
    }

    /// Retrieval without generation. Empty when nothing is indexed.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        let state = self.state.read().await;
        if !state.is_initialized {
            return Ok(Vec::new());
        }
        self.retriever.fetch(query, k, mode, filter).await
    }
}

fn technical_difficulties() -> AnswerOutcome {
    AnswerOutcome::BackendFailure {
        message: TECHNICAL_DIFFICULTIES_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::validation::{GUIDANCE_MESSAGE, REJECTION_MESSAGE, SCOPE_REMINDER};
    use crate::testing::{FakeEmbedder, FakeGenerator};
    use crate::vector_store::{test_document, Document, MemoryVectorStore, VectorStore};

    struct Fixture {
        pipeline: AnswerPipeline,
        embedder: Arc<FakeEmbedder>,
        generator: Arc<FakeGenerator>,
    }

    async fn fixture_with(docs: Vec<(&str, Option<u32>, &str)>, generator: FakeGenerator) -> Fixture {
        let embedder = Arc::new(FakeEmbedder::new(64));
        let store = Arc::new(MemoryVectorStore::new("hr_policies"));
        let documents: Vec<Document> = docs
            .iter()
            .map(|(file, page, text)| test_document(file, *page, text, embedder.vector(text)))
            .collect();
        store.upsert_batch(&documents).await.unwrap();

        let generator = Arc::new(generator);
        let pipeline = AnswerPipeline::new(
            Retriever::new(store, embedder.clone()),
            generator.clone(),
            Prompts::default(),
            PipelineConfig::default(),
        );
        pipeline.sync_state().await.unwrap();

        Fixture {
            pipeline,
            embedder,
            generator,
        }
    }

    async fn leave_fixture() -> Fixture {
        fixture_with(
            vec![
                ("leave.pdf", Some(1), "Annual leave is 25 days per year for every employee."),
                ("leave.pdf", Some(2), "Sick leave requires a doctor's note after three days."),
                ("benefits.pdf", Some(4), "The dental benefit covers two checkups a year."),
            ],
            FakeGenerator::new("You get 25 days of annual leave."),
        )
        .await
    }

    #[tokio::test]
    async fn test_not_ready_never_calls_backends() {
        let fixture = fixture_with(vec![], FakeGenerator::new("unused")).await;
        let mut session = Session::default();

        let outcome = fixture
            .pipeline
            .answer(&mut session, "How many leave days do I get?", None)
            .await;

        assert_eq!(
            outcome,
            AnswerOutcome::NotReady {
                message: NOT_READY_MESSAGE.to_string()
            }
        );
        assert_eq!(fixture.embedder.calls(), 0);
        assert_eq!(fixture.generator.calls(), 0);
        assert!(session.memory.is_empty());

        let response = AnswerResponse::from(outcome);
        assert_eq!(response.error.as_deref(), Some("System not initialized"));
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_answers_with_sources_and_records_exchange() {
        let fixture = leave_fixture().await;
        let mut session = Session::default();

        let outcome = fixture
            .pipeline
            .answer(&mut session, "How much annual leave does an employee get?", None)
            .await;

        match &outcome {
            AnswerOutcome::Answered { answer, sources } => {
                assert_eq!(answer, "You get 25 days of annual leave.");
                assert!(!sources.is_empty() && sources.len() <= 3);
                assert_eq!(sources[0].file, "leave.pdf");
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let prompt = fixture.generator.last_user_prompt().unwrap();
        assert!(prompt.contains("--- Document 1: leave.pdf (Page 1) ---"));
        assert!(!prompt.contains("Previous conversation context"));

        assert_eq!(session.memory.len(), 1);
        assert_eq!(session.memory.window(1)[0].answer, "You get 25 days of annual leave.");
    }

    #[tokio::test]
    async fn test_rejections_skip_retrieval() {
        let fixture = leave_fixture().await;
        let mut session = Session::default();

        let empty = fixture.pipeline.answer(&mut session, "  ", None).await;
        assert_eq!(
            empty,
            AnswerOutcome::Rejected {
                message: GUIDANCE_MESSAGE.to_string()
            }
        );

        let misuse = fixture
            .pipeline
            .answer(&mut session, "How can I bypass the leave approval?", None)
            .await;
        assert_eq!(misuse.answer_text(), REJECTION_MESSAGE);
        assert_eq!(
            AnswerResponse::from(misuse).error.as_deref(),
            Some("Invalid question")
        );

        assert_eq!(fixture.embedder.calls(), 0);
        assert_eq!(fixture.generator.calls(), 0);
        assert!(session.memory.is_empty());
    }

    struct NoSalaryTalk;

    impl QuestionPolicy for NoSalaryTalk {
        fn validate(&self, question: &str) -> Validation {
            if question.to_lowercase().contains("salary") {
                Validation::Rejected("Ask your manager about pay.".to_string())
            } else {
                Validation::Accepted
            }
        }
    }

    #[tokio::test]
    async fn test_custom_policy_replaces_default() {
        let Fixture {
            pipeline,
            embedder,
            generator,
        } = leave_fixture().await;
        let pipeline = pipeline.with_policy(Arc::new(NoSalaryTalk));
        let mut session = Session::default();

        let rejected = pipeline
            .answer(&mut session, "What is my manager's salary?", None)
            .await;
        assert_eq!(
            rejected,
            AnswerOutcome::Rejected {
                message: "Ask your manager about pay.".to_string()
            }
        );
        assert_eq!(embedder.calls(), 0);
        assert_eq!(generator.calls(), 0);

        // The default policy would prefix a scope reminder here.
        let accepted = pipeline
            .answer(&mut session, "What is the weather like today?", None)
            .await;
        assert_eq!(accepted.answer_text(), "You get 25 days of annual leave.");
        assert!(!accepted.answer_text().starts_with(SCOPE_REMINDER));
        assert_eq!(generator.calls(), 1);
        assert_eq!(session.memory.len(), 1);
    }

    #[tokio::test]
    async fn test_scope_reminder_is_prefixed() {
        let fixture = leave_fixture().await;
        let mut session = Session::default();

        let outcome = fixture
            .pipeline
            .answer(&mut session, "What is the weather like today?", None)
            .await;

        assert!(outcome.is_answered());
        assert!(outcome.answer_text().starts_with(SCOPE_REMINDER));
        assert!(outcome.answer_text().ends_with("You get 25 days of annual leave."));
    }

    #[tokio::test]
    async fn test_memory_keeps_last_ten() {
        let fixture = leave_fixture().await;
        let mut session = Session::default();

        for i in 0..11 {
            let question = format!("Leave question number {}?", i);
            let outcome = fixture.pipeline.answer(&mut session, &question, None).await;
            assert!(outcome.is_answered());
        }

        assert_eq!(session.memory.len(), 10);
        assert_eq!(
            session.memory.iter().next().map(|e| e.question.as_str()),
            Some("Leave question number 1?")
        );
    }

    #[tokio::test]
    async fn test_session_history_window_in_prompt() {
        let fixture = leave_fixture().await;
        let mut session = Session::default();

        for i in 0..5 {
            let question = format!("Leave question {}?", i);
            fixture.pipeline.answer(&mut session, &question, None).await;
        }

        let prompt = fixture.generator.last_user_prompt().unwrap();
        assert!(prompt.contains("Previous conversation context:"));
        assert!(prompt.contains("Q: Leave question 3?"));
        assert!(prompt.contains("Q: Leave question 1?"));
        assert!(!prompt.contains("Q: Leave question 0?"));
    }

    #[tokio::test]
    async fn test_external_history_takes_precedence_and_is_not_written() {
        let fixture = leave_fixture().await;
        let mut session = Session::default();
        session
            .memory
            .append(ConversationExchange::new("Session question?", "Session answer."));

        let transcript: Vec<ConversationExchange> = (0..7)
            .map(|i| ConversationExchange::new(format!("Earlier {}?", i), "Earlier answer."))
            .collect();

        let outcome = fixture
            .pipeline
            .answer(&mut session, "Is sick leave paid?", Some(&transcript))
            .await;
        assert!(outcome.is_answered());

        let prompt = fixture.generator.last_user_prompt().unwrap();
        assert!(prompt.contains("Q: Earlier 6?"));
        assert!(prompt.contains("Q: Earlier 2?"));
        assert!(!prompt.contains("Q: Earlier 1?"));
        assert!(!prompt.contains("Session question?"));

        assert_eq!(transcript.len(), 7);
        assert_eq!(session.memory.len(), 2);
    }

    #[tokio::test]
    async fn test_generation_failure_is_recovered() {
        let fixture = leave_fixture().await;
        fixture.generator.set_failing(true);
        let mut session = Session::default();

        let outcome = fixture
            .pipeline
            .answer(&mut session, "How much annual leave do I get?", None)
            .await;

        assert_eq!(outcome.answer_text(), TECHNICAL_DIFFICULTIES_MESSAGE);
        let response = AnswerResponse::from(outcome);
        assert!(response.sources.is_empty());
        assert!(response.error.is_some());
        assert!(session.memory.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_recovered() {
        let fixture = leave_fixture().await;
        fixture.embedder.set_failing(true);
        let mut session = Session::default();

        let outcome = fixture
            .pipeline
            .answer(&mut session, "How much annual leave do I get?", None)
            .await;

        assert!(matches!(outcome, AnswerOutcome::BackendFailure { .. }));
        assert_eq!(fixture.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_timeout_is_recovered() {
        let embedder = Arc::new(FakeEmbedder::new(16));
        let store = Arc::new(MemoryVectorStore::new("hr_policies"));
        store
            .upsert_batch(&[test_document("leave.pdf", Some(1), "leave", embedder.vector("leave"))])
            .await
            .unwrap();

        let config = PipelineConfig {
            request_timeout: Duration::from_millis(20),
            ..PipelineConfig::default()
        };
        let pipeline = AnswerPipeline::new(
            Retriever::new(store, embedder),
            Arc::new(FakeGenerator::new("late").with_delay(Duration::from_secs(5))),
            Prompts::default(),
            config,
        );
        pipeline.sync_state().await.unwrap();

        let outcome = pipeline
            .answer(&mut Session::default(), "How much leave?", None)
            .await;
        assert!(matches!(outcome, AnswerOutcome::BackendFailure { .. }));
    }

    #[tokio::test]
    async fn test_sources_are_deduplicated_and_capped() {
        let fixture = fixture_with(
            vec![
                ("leave.pdf", Some(1), "leave policy part one"),
                ("leave.pdf", Some(1), "leave policy part two"),
                ("leave.pdf", Some(2), "leave policy part three"),
                ("benefits.pdf", Some(1), "leave policy and benefits"),
                ("conduct.pdf", Some(1), "leave policy and conduct"),
            ],
            FakeGenerator::new("answer"),
        )
        .await;

        let outcome = fixture
            .pipeline
            .answer(&mut Session::default(), "leave policy", None)
            .await;

        match outcome {
            AnswerOutcome::Answered { sources, .. } => {
                assert_eq!(sources.len(), 3);
                let mut keys: Vec<(String, String)> =
                    sources.iter().map(|s| (s.file.clone(), s.page.clone())).collect();
                keys.sort();
                keys.dedup();
                assert_eq!(keys.len(), 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_results_when_store_emptied() {
        let fixture = leave_fixture().await;
        fixture
            .pipeline
            .retriever()
            .store()
            .delete_collection()
            .await
            .unwrap();

        let outcome = fixture
            .pipeline
            .answer(&mut Session::default(), "How much annual leave?", None)
            .await;
        assert_eq!(outcome.answer_text(), NO_RESULTS_MESSAGE);

        let response = AnswerResponse::from(outcome);
        assert_eq!(response.warning.as_deref(), Some("No relevant documents found"));
        assert!(response.sources.is_empty());
        assert_eq!(fixture.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_is_empty_when_not_ready() {
        let fixture = fixture_with(vec![], FakeGenerator::new("unused")).await;
        let hits = fixture
            .pipeline
            .search("leave", 5, SearchMode::Similarity, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
