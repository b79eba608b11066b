//! HTTP API server for integration with other systems.
//!
//! Provides JSON endpoints for ingestion, status, search and question answering.
//! Conversations are kept per `session_id`; callers that omit one get a fresh
//! session and its id back.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::HandbookError;
use crate::orchestrator::{Assistant, SearchHit};
use crate::rag::{AnswerResponse, ConversationExchange, SearchMode, Session};
use crate::vector_store::MetadataFilter;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Sessions idle longer than this are dropped.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on live sessions; the least recently used one is dropped first.
const MAX_SESSIONS: usize = 1000;

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

/// Conversation sessions keyed by id, with idle expiry and a size cap.
struct SessionStore {
    entries: HashMap<String, SessionEntry>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Fetch a live session and mark it used.
    fn get(&mut self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.evict_idle();
        self.entries.get_mut(id).map(|entry| {
            entry.last_used = Instant::now();
            entry.session.clone()
        })
    }

    /// Fetch the session stored under `session.id`, inserting `session` if there is none.
    fn get_or_insert(&mut self, session: Session) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.get(&session.id) {
            return existing;
        }

        while self.entries.len() >= self.max_sessions {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!(session_id = %id, "Evicting least recently used session");
                    self.entries.remove(&id);
                }
                None => break,
            }
        }

        let id = session.id.clone();
        let session = Arc::new(Mutex::new(session));
        self.entries.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_used: Instant::now(),
            },
        );
        debug!(sessions = self.len(), "Session created");
        session
    }

    fn evict_idle(&mut self) {
        let ttl = self.idle_ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_used.elapsed() <= ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle sessions");
        }
    }
}

/// Shared application state.
struct AppState {
    assistant: Assistant,
    sessions: Mutex<SessionStore>,
}

impl AppState {
    fn new(assistant: Assistant) -> Self {
        Self::with_session_limits(assistant, SESSION_IDLE_TTL, MAX_SESSIONS)
    }

    fn with_session_limits(assistant: Assistant, idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            assistant,
            sessions: Mutex::new(SessionStore::new(idle_ttl, max_sessions)),
        }
    }

    /// Look up a session, creating it under the requested (or a new) id.
    async fn session(&self, id: Option<&str>) -> Arc<Mutex<Session>> {
        let session = match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => self.assistant.session_with_id(id),
            None => self.assistant.new_session(),
        };

        self.sessions.lock().await.get_or_insert(session)
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let assistant = Assistant::new(settings).await?;
    let state = Arc::new(AppState::new(assistant));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Handbook API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Status", "GET  /status");
    Output::kv("Index directory", "POST /initialize");
    Output::kv("Add document", "POST /documents");
    Output::kv("Rebuild", "POST /update");
    Output::kv("Ask", "POST /ask");
    Output::kv("Search", "POST /search");
    Output::kv("Clear history", "POST /history/clear");
    Output::kv("Reset", "POST /reset");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/initialize", post(initialize))
        .route("/documents", post(add_document))
        .route("/update", post(update))
        .route("/ask", post(ask))
        .route("/search", post(search))
        .route("/history/clear", post(clear_history))
        .route("/reset", post(reset))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize, Default)]
struct IngestRequest {
    /// Directory to index; the configured documents directory when absent.
    #[serde(default)]
    directory: Option<PathBuf>,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct AddDocumentRequest {
    path: PathBuf,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    session_id: Option<String>,
    /// Transcript kept by the caller. Used for the prompt instead of the session history.
    #[serde(default)]
    history: Option<Vec<ConversationExchange>>,
}

#[derive(Serialize)]
struct AskResponse {
    session_id: String,
    #[serde(flatten)]
    response: AnswerResponse,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    mode: Option<SearchMode>,
    #[serde(default)]
    source_file: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

fn default_limit() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct ClearHistoryRequest {
    session_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: HandbookError) -> Response {
    let status = match e {
        HandbookError::NotFound(_) => StatusCode::NOT_FOUND,
        HandbookError::InvalidInput(_) | HandbookError::UnsupportedFormat(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %e, "Request failed");
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    match state.assistant.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

async fn initialize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Response {
    let dir = req
        .directory
        .unwrap_or_else(|| state.assistant.settings().documents_dir());

    match state.assistant.initialize(&dir, req.force).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn add_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddDocumentRequest>,
) -> Response {
    match state.assistant.add_document(&req.path).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Response {
    let dir = req
        .directory
        .unwrap_or_else(|| state.assistant.settings().documents_dir());

    match state.assistant.update(&dir).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    let session = state.session(req.session_id.as_deref()).await;
    let mut session = session.lock().await;

    let response = state
        .assistant
        .answer(&mut session, &req.question, req.history.as_deref())
        .await;

    Json(AskResponse {
        session_id: session.id.clone(),
        response,
    })
    .into_response()
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Response {
    let mode = req
        .mode
        .unwrap_or(state.assistant.settings().retrieval.search_mode);
    let filter = MetadataFilter {
        source_file: req.source_file,
        category: req.category,
    };
    let filter = (!filter.is_empty()).then_some(filter);

    match state
        .assistant
        .search(&req.query, req.limit, mode, filter.as_ref())
        .await
    {
        Ok(results) => Json(SearchResponse { results }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn clear_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClearHistoryRequest>,
) -> Response {
    let session = state.sessions.lock().await.get(&req.session_id);

    match session {
        Some(session) => {
            let mut session = session.lock().await;
            state.assistant.clear_history(&mut session);
            Json(serde_json::json!({ "cleared": true })).into_response()
        }
        None => Json(serde_json::json!({ "cleared": false })).into_response(),
    }
}

async fn reset(State(state): State<Arc<AppState>>) -> Response {
    let success = state.assistant.reset().await;
    if success {
        info!("Knowledge base reset over HTTP");
        Json(serde_json::json!({ "success": true })).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "success": false, "error": "Failed to reset knowledge base" })),
        )
            .into_response()
    }
}
