//! Dashboard HTTP API and WebSocket push channel.
//!
//! All mutations route through the [`WorkflowEngine`]; handlers translate
//! the typed error taxonomy into HTTP statuses and attach `nextSteps`
//! hints so an agent driving the API can self-correct.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::ws::WebSocketUpgrade,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::approvals::{ApprovalStatus, Decision};
use crate::errors::{ApprovalError, LogError, StoreError, TaskError};
use crate::logs::{LogEntryDraft, LogFilter};
use crate::sync::ws;
use crate::tasks::TaskId;
use crate::workflow::WorkflowEngine;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub engine: WorkflowEngine,
}

pub type SharedState = Arc<AppState>;

// ── Server configuration ──────────────────────────────────────────────

pub struct ServerConfig {
    pub port: u16,
    pub project_dir: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5353,
            project_dir: PathBuf::from("."),
            dev_mode: false,
        }
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestApprovalBody {
    pub spec_name: String,
    pub file_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveApprovalBody {
    pub decision: Decision,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryParams {
    pub task_id: Option<String>,
    pub search: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

/// One HTTP-shaped error: the taxonomy name travels in `error`, the
/// human-readable detail in `message`.
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "BadRequest",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"error": self.kind, "message": self.message})),
        )
            .into_response()
    }
}

impl From<ApprovalError> for ApiError {
    fn from(e: ApprovalError) -> Self {
        let (status, kind) = match &e {
            ApprovalError::Conflict { .. } => (StatusCode::CONFLICT, "Conflict"),
            ApprovalError::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
            ApprovalError::AlreadyResolved { .. } => (StatusCode::CONFLICT, "AlreadyResolved"),
            ApprovalError::AlreadyCleaned { .. } => (StatusCode::CONFLICT, "AlreadyCleaned"),
            ApprovalError::NotResolved { .. } => (StatusCode::CONFLICT, "NotResolved"),
            ApprovalError::MissingComment => (StatusCode::BAD_REQUEST, "MissingComment"),
            ApprovalError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        let (status, kind) = match &e {
            TaskError::SpecNotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
            TaskError::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
            TaskError::AlreadyInProgress { .. } => (StatusCode::CONFLICT, "AlreadyInProgress"),
            TaskError::NotPending { .. } => (StatusCode::CONFLICT, "NotPending"),
            TaskError::NotInProgress { .. } => (StatusCode::CONFLICT, "NotInProgress"),
            TaskError::NoImplementationLog { .. } => (StatusCode::CONFLICT, "NoImplementationLog"),
            TaskError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl From<LogError> for ApiError {
    fn from(e: LogError) -> Self {
        let (status, kind) = match &e {
            LogError::MissingField { .. } => (StatusCode::BAD_REQUEST, "MissingField"),
            LogError::SpecNotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
            LogError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let (status, kind) = match &e {
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
            StoreError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "Internal",
            message: e.to_string(),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/approvals", get(list_approvals).post(request_approval))
        .route(
            "/api/approvals/{id}",
            get(approval_status).delete(cleanup_approval),
        )
        .route("/api/approvals/{id}/resolve", post(resolve_approval))
        .route("/api/specs", get(list_specs))
        .route("/api/specs/{spec}/tasks", get(list_tasks))
        .route("/api/specs/{spec}/tasks/{task_id}/start", post(start_task))
        .route(
            "/api/specs/{spec}/tasks/{task_id}/complete",
            post(complete_task),
        )
        .route("/api/specs/{spec}/logs", get(query_logs).post(append_log))
        .route("/health", get(health_check))
}

/// Full application router: API plus the per-project push channel.
pub fn build_router(state: SharedState) -> Router {
    api_router()
        .route("/ws/{project}", get(ws_handler))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let engine = WorkflowEngine::new(&config.project_dir)?;
    info!(project = engine.project_id(), port = config.port, "starting dashboard server");
    let state = Arc::new(AppState { engine });

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

// ── Approval handlers ─────────────────────────────────────────────────

async fn request_approval(
    State(state): State<SharedState>,
    Json(body): Json<RequestApprovalBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .engine
        .request_approval(&body.spec_name, &body.file_path)?;
    let hint = format!("Poll GET /api/approvals/{} until resolved", request.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "approval": request,
            "nextSteps": [
                hint,
                "Do not proceed until the request is approved and cleaned up",
            ],
        })),
    ))
}

async fn list_approvals(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({"approvals": state.engine.list_approvals()}))
}

async fn approval_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = state.engine.approval_status(&id)?;
    Ok(Json(json!({"approval": request})))
}

async fn resolve_approval(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<ResolveApprovalBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = state
        .engine
        .resolve_approval(&id, body.decision, body.comment.as_deref())?;
    let next_steps = match request.status {
        ApprovalStatus::Approved => {
            vec![format!("Requester cleans up with DELETE /api/approvals/{id}")]
        }
        _ => vec![
            "Requester revises the artifact and submits a new approval request".to_string(),
        ],
    };
    Ok(Json(json!({"approval": request, "nextSteps": next_steps})))
}

async fn cleanup_approval(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.cleanup_approval(&id)?;
    Ok(Json(json!({
        "cleaned": id,
        "nextSteps": ["Approval cycle complete; proceed to the next phase"],
    })))
}

// ── Spec and task handlers ────────────────────────────────────────────

async fn list_specs(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summaries = state.engine.spec_summaries()?;
    Ok(Json(json!({"specs": summaries})))
}

async fn list_tasks(
    State(state): State<SharedState>,
    Path(spec): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tasks = state.engine.list_tasks(&spec)?;
    Ok(Json(json!({"tasks": tasks})))
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError::bad_request(e))
}

async fn start_task(
    State(state): State<SharedState>,
    Path((spec, task_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let record = state.engine.start_task(&spec, &task_id)?;
    Ok(Json(json!({
        "task": record,
        "nextSteps": [
            "Implement the task, then append an implementation log entry",
            format!("Complete with POST /api/specs/{spec}/tasks/{task_id}/complete"),
        ],
    })))
}

async fn complete_task(
    State(state): State<SharedState>,
    Path((spec, task_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let record = state.engine.complete_task(&spec, &task_id)?;
    Ok(Json(json!({
        "task": record,
        "nextSteps": ["Start the next pending task"],
    })))
}

// ── Implementation log handlers ───────────────────────────────────────

async fn append_log(
    State(state): State<SharedState>,
    Path(spec): Path<String>,
    Json(mut draft): Json<LogEntryDraft>,
) -> Result<impl IntoResponse, ApiError> {
    // The path is authoritative for the spec name.
    draft.spec_name = spec.clone();
    let entry = state.engine.append_log(draft)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "entry": entry,
            "nextSteps": [format!(
                "Complete the task with POST /api/specs/{spec}/tasks/{}/complete",
                entry.task_id
            )],
        })),
    ))
}

async fn query_logs(
    State(state): State<SharedState>,
    Path(spec): Path<String>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = LogFilter {
        task_id: params.task_id,
        search: params.search,
    };
    let entries = state.engine.query_logs(&spec, &filter)?;
    Ok(Json(json!({"entries": entries})))
}

// ── WebSocket and health ──────────────────────────────────────────────

async fn ws_handler(
    ws_upgrade: WebSocketUpgrade,
    Path(project): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let rx = state.engine.hub().subscribe_raw(&project);
    ws_upgrade.on_upgrade(move |socket| ws::serve_socket(socket, rx))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

// ── Tests ─────────────────────────────────────────────────────────────
