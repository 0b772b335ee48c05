//! Host bridge route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<HostState>`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::QueuedNotifier;
use crate::commands::{Command, Skill};
use crate::heartbeat::{Heartbeat, SweepReport};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct HostState {
    pub skill: Arc<Skill>,
    pub heartbeat: Arc<Heartbeat>,
    pub notifier: Arc<QueuedNotifier>,
}

impl HostState {
    pub fn new(skill: Arc<Skill>, heartbeat: Arc<Heartbeat>, notifier: Arc<QueuedNotifier>) -> Self {
        Self {
            skill,
            heartbeat,
            notifier,
        }
    }
}

pub type AppState = Arc<HostState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub user_id: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub markdown: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /skill
pub async fn get_skill(State(state): State<AppState>) -> Json<Value> {
    Json(state.skill.manifest())
}

/// POST /commands/:name
pub async fn run_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command: Command = name
        .parse()
        .map_err(|_| api_error(StatusCode::NOT_FOUND, format!("Unknown command: {name}")))?;

    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "userId is required"));
    }
    let ctx = state
        .skill
        .context(user_id)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let markdown = state.skill.dispatch(command, &ctx, req.params).await;
    Ok(Json(CommandResponse { markdown }))
}

/// POST /heartbeat
pub async fn run_heartbeat(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.heartbeat.sweep().await)
}

/// GET /users/:id/notifications
pub async fn get_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<String>> {
    Json(state.notifier.drain(&user_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
