//! HTTP endpoint modules.
//!
//! Each sub-module owns one area of the surface. The shared error body and
//! the error mapping helpers live here.

pub mod doc;
pub mod events;
pub mod executions;
pub mod health;
pub mod tasks;
pub mod ws;

use axum::http::StatusCode;
use axum::Json;
use crewstream_executor::ExecutionError;
use crewstream_queue::QueueError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

// ── Error helpers ────────────────────────────────────────────────

pub(crate) fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn not_found(resource: &str, id: impl std::fmt::Display) -> ApiError {
    error(StatusCode::NOT_FOUND, format!("{resource} not found: {id}"))
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    error(StatusCode::BAD_REQUEST, message)
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub(crate) fn execution_error(e: ExecutionError) -> ApiError {
    let status = match &e {
        ExecutionError::NotFound { .. } => StatusCode::NOT_FOUND,
        ExecutionError::Validation(_) => StatusCode::BAD_REQUEST,
        ExecutionError::Conflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.to_string())
}

pub(crate) fn queue_error(e: QueueError) -> ApiError {
    let status = match &e {
        QueueError::UnknownTask(_) => StatusCode::NOT_FOUND,
        QueueError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.to_string())
}
