//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/health` | Liveness plus stored document count |
//! | `GET`    | `/api/search?q=&limit=` | Semantic search |
//! | `POST`   | `/api/index?reindex=` | Start a background index job |
//! | `GET`    | `/api/index/{job_id}` | Poll a job |
//! | `DELETE` | `/api/index/{job_id}` | Cancel a job |
//! | `GET`    | `/api/stats` | Facet summary |
//! | `GET`    | `/api/documents` | List documents |
//! | `POST`   | `/api/upload` | Multipart upload (`files` fields) |
//! | `DELETE` | `/api/documents/{id}` | Delete one document |
//! | `DELETE` | `/api/documents` | Delete all documents |
//!
//! # Error Contract
//!
//! Failures answer with an envelope and a matching status code:
//!
//! ```json
//! { "success": false, "message": "Search failed", "error": "could not embed query: ..." }
//! ```
//!
//! A panic inside a handler is caught and rendered the same way with
//! status 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tracing::{error, info, warn};

use semdex_core::error::{EmbedError, SearchError, StoreError};
use semdex_core::models::{DocumentSummary, SearchHit};
use semdex_core::stats::IndexStats;

use crate::config::Config;
use crate::jobs::JobStatus;
use crate::service::{DocumentService, Envelope, UploadFile, UploadReport};

/// Upload request bodies may be this large.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: Arc<DocumentService>,
}

/// Build the API router around `service`.
pub fn router(service: Arc<DocumentService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/search", get(handle_search))
        .route("/api/index", post(handle_start_index))
        .route(
            "/api/index/{job_id}",
            get(handle_job_status).delete(handle_cancel_job),
        )
        .route("/api/stats", get(handle_stats))
        .route(
            "/api/documents",
            get(handle_list_documents).delete(handle_delete_all),
        )
        .route("/api/documents/{id}", delete(handle_delete_one))
        .route(
            "/api/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .with_state(AppState { service })
}

/// Start the HTTP server on `[server].bind` and run until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(DocumentService::from_config(config).await?);
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "semdex API listening");
    println!("semdex API listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an envelope response.
struct AppError {
    status: StatusCode,
    envelope: Envelope,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            status,
            envelope: Envelope::failed(message, error),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

fn store_error(message: &str, err: StoreError) -> AppError {
    error!(error = %err, "{}", message);
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, message, err)
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Embedding(EmbedError::Disabled) => AppError::new(
                StatusCode::BAD_REQUEST,
                "Embeddings are disabled",
                EmbedError::Disabled,
            ),
            SearchError::Embedding(e) => {
                warn!(error = %e, "query embedding failed");
                AppError::new(StatusCode::BAD_GATEWAY, "Search failed", e)
            }
            SearchError::Store(e) => store_error("Search failed", e),
        }
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "handler panicked");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", detail).into_response()
}

// ============ GET /api/health ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    documents_indexed: u64,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let documents_indexed = state
        .service
        .count()
        .await
        .map_err(|e| store_error("Failed to count documents", e))?;

    Ok(Json(HealthResponse {
        status: "running",
        timestamp: Utc::now(),
        documents_indexed,
    }))
}

// ============ GET /api/search ============

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchBody {
    query: String,
    results: Vec<SearchHit>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchBody>, AppError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Ok(Json(SearchBody {
            query,
            results: Vec::new(),
            count: 0,
            message: Some("Please provide a search query"),
        }));
    }

    let response = state.service.search(&query, params.limit).await?;
    Ok(Json(SearchBody {
        query,
        results: response.results,
        count: response.count,
        message: None,
    }))
}

// ============ /api/index ============

#[derive(Deserialize)]
struct IndexQuery {
    #[serde(default)]
    reindex: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexStarted {
    success: bool,
    message: &'static str,
    indexing: bool,
    job_id: String,
}

async fn handle_start_index(
    State(state): State<AppState>,
    Query(params): Query<IndexQuery>,
) -> (StatusCode, Json<IndexStarted>) {
    let handle = state
        .service
        .start_index(None, params.reindex.unwrap_or(false));

    (
        StatusCode::ACCEPTED,
        Json(IndexStarted {
            success: true,
            message: "Indexing started in background",
            indexing: true,
            job_id: handle.id,
        }),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobBody {
    job_id: String,
    status: JobStatus,
}

fn job_not_found(job_id: &str) -> AppError {
    AppError::new(
        StatusCode::NOT_FOUND,
        "Index job not found",
        format!("no job with id {}", job_id),
    )
}

async fn handle_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobBody>, AppError> {
    let status = state
        .service
        .job_status(&job_id)
        .ok_or_else(|| job_not_found(&job_id))?;
    Ok(Json(JobBody { job_id, status }))
}

async fn handle_cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    if state.service.cancel_job(&job_id) {
        Ok(Json(Envelope::ok("Cancellation requested")))
    } else {
        Err(job_not_found(&job_id))
    }
}

// ============ GET /api/stats, /api/documents ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    let stats = state
        .service
        .stats()
        .await
        .map_err(|e| store_error("Failed to compute stats", e))?;
    Ok(Json(stats))
}

#[derive(Serialize)]
struct DocumentList {
    documents: Vec<DocumentSummary>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentList>, AppError> {
    let documents = state
        .service
        .list_documents()
        .await
        .map_err(|e| store_error("Failed to list documents", e))?;
    Ok(Json(DocumentList { documents }))
}

// ============ POST /api/upload ============

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, "Upload failed", e))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, "Upload failed", e))?;
        files.push(UploadFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "No files provided",
            "multipart body has no 'files' field",
        ));
    }

    Ok(Json(state.service.upload(files).await))
}

// ============ DELETE /api/documents ============

async fn handle_delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    let existed = state
        .service
        .delete_one(&id)
        .await
        .map_err(|e| store_error("Failed to delete document", e))?;

    if existed {
        Ok(Json(Envelope::ok("Document deleted successfully")))
    } else {
        Err(AppError::new(
            StatusCode::NOT_FOUND,
            "Document not found",
            format!("no document with id {}", id),
        ))
    }
}

async fn handle_delete_all(State(state): State<AppState>) -> Result<Json<Envelope>, AppError> {
    state
        .service
        .delete_all()
        .await
        .map_err(|e| store_error("Failed to delete all documents", e))?;
    Ok(Json(Envelope::ok("All documents deleted successfully")))
}
