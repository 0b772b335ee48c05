//! Host bridge: Axum server standing in for the bot runtime.
//!
//! Exposes the skill manifest, command dispatch, on-demand heartbeat sweeps
//! and a per-user notification queue the runtime can poll.

pub mod routes;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::commands::Notifier;
use crate::config::HostConfig;

pub use routes::{AppState, HostState};

const DEFAULT_MAX_PENDING: usize = 100;

// ---------------------------------------------------------------------------
// Notification queue
// ---------------------------------------------------------------------------

/// Notifier that parks messages until the host drains them.
///
/// Each user's queue holds at most `max_pending` messages; the oldest is
/// dropped when a new one arrives at a full queue.
pub struct QueuedNotifier {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    max_pending: usize,
}

impl Default for QueuedNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl QueuedNotifier {
    pub fn new(max_pending: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_pending: max_pending.max(1),
        }
    }

    pub fn from_config(cfg: &HostConfig) -> Self {
        Self::new(cfg.max_pending_per_user)
    }

    /// Take every pending message for `user_id`, oldest first.
    pub fn drain(&self, user_id: &str) -> Vec<String> {
        let removed = match self.queues.lock() {
            Ok(mut queues) => queues.remove(user_id),
            Err(poisoned) => poisoned.into_inner().remove(user_id),
        };
        removed.map(Vec::from).unwrap_or_default()
    }

    pub fn pending(&self, user_id: &str) -> usize {
        match self.queues.lock() {
            Ok(queues) => queues.get(user_id).map_or(0, VecDeque::len),
            Err(poisoned) => poisoned.into_inner().get(user_id).map_or(0, VecDeque::len),
        }
    }
}

#[async_trait]
impl Notifier for QueuedNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<()> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| anyhow::anyhow!("notification queue lock poisoned"))?;
        let queue = queues.entry(user_id.to_string()).or_default();
        if queue.len() >= self.max_pending {
            queue.pop_front();
            warn!(user_id, max_pending = self.max_pending, "Notification queue full, dropped oldest");
        }
        queue.push_back(message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Bind the host port and serve in a background task.
pub async fn spawn_host(state: AppState, cfg: &HostConfig) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = format!("{}:{}", cfg.bind, cfg.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind host bridge on {addr}"))?;
    info!(addr = %addr, "Host bridge listening on http://{addr}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Host bridge server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/skill", get(routes::get_skill))
        .route("/commands/:name", post(routes::run_command))
        .route("/heartbeat", post(routes::run_heartbeat))
        .route("/users/:id/notifications", get(routes::get_notifications))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
