//! Shared handler state, error mapping and health endpoints

use crate::flow::{FieldError, FlowError, FlowManager};
use crate::neo4j::StoreError;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub flow: Arc<FlowManager>,
}

pub type FlowState = Arc<ServerState>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub neo4j: bool,
    pub version: String,
}

/// Liveness plus store reachability
pub async fn health(State(state): State<FlowState>) -> (StatusCode, Json<HealthResponse>) {
    let neo4j_ok = state.flow.store().health_check().await;

    let (http_status, status) = if neo4j_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            neo4j: neo4j_ok,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn ping() -> &'static str {
    "pong"
}

// ============================================================================
// Error handling
// ============================================================================

pub enum AppError {
    Internal(anyhow::Error),
    Validation(Vec<FieldError>),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            AppError::Validation(errors) => {
                let message = errors
                    .iter()
                    .map(|e| format!("{} {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    serde_json::json!({ "error": message, "errors": errors }),
                )
            }
            AppError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": e.to_string() }),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, serde_json::json!({ "error": msg }))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Validation(errors) => AppError::Validation(errors),
            FlowError::NotFound(msg) => AppError::NotFound(msg),
            FlowError::Conflict(msg) => AppError::Conflict(msg),
            FlowError::Token(msg) => AppError::Unauthorized(msg),
            FlowError::Store(e @ StoreError::Transient { .. }) => AppError::Unavailable(e.to_string()),
            FlowError::Store(e) => {
                tracing::error!("Store failure: {}", e);
                AppError::Internal(e.into())
            }
        }
    }
}
