//! REST API Handlers
//!
//! HTTP front door for the command surface, plus health, readiness and
//! Prometheus metrics endpoints.

use crate::controlplane::orchestrator::{error_reply, Command, Orchestrator};
use crate::error::{Error, ErrorKind};
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// =============================================================================
// Request Types
// =============================================================================

/// Body of every command request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Resource name
    pub name: String,
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    orchestrator: Arc<Orchestrator>,
}

impl RestRouter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            orchestrator: self.orchestrator,
        };

        Router::new()
            .route("/v1/commands/:command", post(run_command))
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// HTTP status for a failed command
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnknownCommand(_) => StatusCode::NOT_FOUND,
        Error::NotConfigured { .. } => StatusCode::NOT_IMPLEMENTED,
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Backend => StatusCode::BAD_GATEWAY,
            ErrorKind::Fanout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn error_response(err: &Error) -> Response {
    (status_for(err), Json(error_reply(err))).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Run a provisioning command
async fn run_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(&Error::Validation(rejection.body_text())),
    };

    let command = match Command::from_parts(&command, request.name) {
        Ok(command) => command,
        Err(e) => return error_response(&e),
    };

    info!("Command {} {}", command.name(), command.resource());

    // Detached so a dropped connection cannot stop provisioning midway
    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.handle(command).await });

    match task.await {
        Ok(Ok(output)) => (StatusCode::OK, Json(output.to_reply())).into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Command task failed: {}", e);
            error_response(&Error::Internal(format!("command task failed: {}", e)))
        }
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.orchestrator.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    }
}

/// Prometheus exposition
async fn metrics(State(state): State<AppState>) -> Response {
    let metrics = state.orchestrator.metrics();
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
