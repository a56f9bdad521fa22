//! JSON HTTP API.
//!
//! Exposes the session-scoped pipeline over axum. Every operation has an
//! explicit tagged request/response record, validated at the boundary
//! before any core state is touched.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/session` | Create a session |
//! | `GET` | `/api/session/{id}` | Session info |
//! | `DELETE` | `/api/session/{id}` | Delete a session |
//! | `POST` | `/api/session/{id}/upload` | Upload and ingest bill files |
//! | `POST` | `/api/session/{id}/search` | Semantic search over bills |
//! | `POST` | `/api/session/{id}/chat` | Grounded chat |
//! | `GET` | `/api/session/{id}/analysis` | Spending analysis snapshot |
//! | `GET` | `/api/session/{id}/bills` | List bill records |
//! | `GET` | `/health` | Health check |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "validation_error", "message": "top_k must be >= 1" } }
//! ```
//!
//! Codes: `validation_error` (400), `not_found` (404),
//! `unsupported_media_type` (415), `upstream_error` (502),
//! `upstream_timeout` (504), `internal` (500). Per-file upload outcomes
//! carry their own codes (including `extraction_failed`) without failing
//! the request.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analysis::analyze;
use crate::chat;
use crate::config::Config;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::error::Error;
use crate::extract::{BuiltinExtractor, TextExtractor};
use crate::ingest::{ingest_files, FileOutcome, OutcomeError, UploadFile};
use crate::llm::{Generator, HttpGenerator};
use crate::models::{AnalysisSnapshot, BillRecord, SearchHit, SessionInfo, SourceCitation};
use crate::retrieve::retrieve;
use crate::session::SessionStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SessionStore,
    pub extractor: Arc<dyn TextExtractor>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

/// Starts the HTTP server with the default capability implementations.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState {
        config: Arc::new(config.clone()),
        store: SessionStore::new(),
        extractor: Arc::new(BuiltinExtractor),
        embedder: Arc::new(HttpEmbedder::new(&config.llm)?),
        generator: Arc::new(HttpGenerator::new(&config.llm)?),
    };

    let bind_addr = config.server.bind.clone();
    let app = router(state);

    tracing::info!(%bind_addr, "spendlens API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router; separated from [`run_server`] so tests can drive
/// handlers with injected capabilities.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/session", post(handle_create_session))
        .route(
            "/api/session/{id}",
            get(handle_session_info).delete(handle_delete_session),
        )
        .route("/api/session/{id}/upload", post(handle_upload))
        .route("/api/session/{id}/search", post(handle_search))
        .route("/api/session/{id}/chat", post(handle_chat))
        .route("/api/session/{id}/analysis", get(handle_analysis))
        .route("/api/session/{id}/bills", get(handle_bills))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error body: `{"error": {"code", "message"}}`.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Wrapper converting core errors into HTTP responses.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            // Extraction failures are per-file outcomes; one reaching
            // here is an invariant slip, treated as internal.
            Error::Extraction(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error surfaced to client");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ POST /api/session ============

#[derive(Deserialize)]
struct CreateSessionRequest {
    api_key: String,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    if req.api_key.trim().is_empty() {
        return Err(Error::Validation("api_key is required".to_string()).into());
    }

    let session = state.store.create(req.api_key);
    tracing::info!(session_id = %session.id, "session created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.clone(),
            created_at: session.created_at,
        }),
    ))
}

// ============ GET /api/session/{id} ============

async fn handle_session_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.store.get(&id)?;
    Ok(Json(session.info().await))
}

// ============ DELETE /api/session/{id} ============

#[derive(Serialize)]
struct DeleteSessionResponse {
    deleted: bool,
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, ApiError> {
    state.store.delete(&id)?;
    tracing::info!(session_id = %id, "session deleted");
    Ok(Json(DeleteSessionResponse { deleted: true }))
}

// ============ POST /api/session/{id}/upload ============

#[derive(Deserialize)]
struct UploadRequest {
    files: Vec<UploadFileBody>,
}

#[derive(Deserialize)]
struct UploadFileBody {
    filename: String,
    content_base64: String,
    mime: String,
}

#[derive(Serialize)]
struct UploadResponse {
    session_id: String,
    results: Vec<FileOutcome>,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let session = state.store.get(&id)?;
    if req.files.is_empty() {
        return Err(Error::Validation("no files provided".to_string()).into());
    }

    // Decode failures are per-file outcomes: a bad payload for one file
    // must not abort its siblings.
    let mut decoded: Vec<std::result::Result<UploadFile, FileOutcome>> = Vec::new();
    for file in req.files {
        match BASE64.decode(file.content_base64.as_bytes()) {
            Ok(bytes) => decoded.push(Ok(UploadFile {
                filename: file.filename,
                bytes,
                mime: file.mime,
            })),
            Err(e) => {
                let err = Error::Validation(format!("invalid base64 content: {}", e));
                decoded.push(Err(FileOutcome {
                    filename: file.filename,
                    record: None,
                    error: Some(OutcomeError::from(&err)),
                }));
            }
        }
    }

    let mut results = Vec::with_capacity(decoded.len());
    for item in decoded {
        match item {
            Ok(file) => {
                let mut outcome = ingest_files(
                    &session,
                    state.extractor.as_ref(),
                    state.embedder.as_ref(),
                    state.config.chunking.chunk_chars,
                    state.config.upload.max_file_bytes,
                    vec![file],
                )
                .await;
                results.append(&mut outcome);
            }
            Err(outcome) => results.push(outcome),
        }
    }

    Ok(Json(UploadResponse {
        session_id: id,
        results,
    }))
}

// ============ POST /api/session/{id}/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    top_k: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
    count: usize,
}

async fn handle_search(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let session = state.store.get(&id)?;

    let top_k = match req.top_k {
        Some(k) if k < 1 => {
            return Err(Error::Validation("top_k must be >= 1".to_string()).into());
        }
        Some(k) => k as usize,
        None => state.config.retrieval.default_top_k,
    };

    let results = retrieve(&session, state.embedder.as_ref(), &req.query, top_k).await?;

    Ok(Json(SearchResponse {
        count: results.len(),
        query: req.query,
        results,
    }))
}

// ============ POST /api/session/{id}/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    session_id: String,
    response: String,
    sources: Vec<SourceCitation>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = state.store.get(&id)?;

    let (response, sources) = chat::chat(
        &session,
        state.embedder.as_ref(),
        state.generator.as_ref(),
        &state.config.retrieval,
        &req.message,
    )
    .await?;

    Ok(Json(ChatResponse {
        session_id: id,
        response,
        sources,
    }))
}

// ============ GET /api/session/{id}/analysis ============

async fn handle_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisSnapshot>, ApiError> {
    let session = state.store.get(&id)?;
    let state_guard = session.read().await;
    let snapshot = analyze(&state_guard.bills, &state.config.insights);
    Ok(Json(snapshot))
}

// ============ GET /api/session/{id}/bills ============

#[derive(Serialize)]
struct BillsResponse {
    session_id: String,
    bills: Vec<BillRecord>,
    count: usize,
}

async fn handle_bills(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BillsResponse>, ApiError> {
    let session = state.store.get(&id)?;
    let bills = session.read().await.bills.clone();
    Ok(Json(BillsResponse {
        count: bills.len(),
        session_id: id,
        bills,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    active_sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.store.len(),
    })
}
