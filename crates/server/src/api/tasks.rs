//! Queue task status and revocation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use crewstream_queue::{TaskQueue, TaskStatusReport};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::state::AppState;

use super::{not_found, queue_error, ApiResult};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokeResponse {
    pub task_id: Uuid,
    /// False when the task had already finished.
    pub revoked: bool,
}

/// Status from the queue's own bookkeeping. Unknown ids report `"unknown"`.
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = String, Path, description = "Queue task id")),
    responses(
        (status = 200, description = "Task status", body = TaskStatusReport)
    )
)]
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Json<TaskStatusReport> {
    Json(state.task_status.get_status(&task_id).await)
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(
        ("task_id" = uuid::Uuid, Path, description = "Queue task id"),
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Revocation result", body = RevokeResponse),
        (status = 404, description = "Unknown task or not the caller's", body = super::ErrorResponse)
    )
)]
pub async fn revoke_task(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<RevokeResponse>> {
    let id = Uuid::parse_str(&task_id).map_err(|_| not_found("task", &task_id))?;
    // Tasks queued by someone else look the same as unknown ones.
    if state.task_owner(&id).as_deref() != Some(user.id()) {
        return Err(not_found("task", id));
    }
    if state.queue.status(&id).await.is_none() {
        return Err(not_found("task", id));
    }
    let revoked = state.queue.revoke(&id).await.map_err(queue_error)?;
    info!(task_id = %id, revoked, user_id = %user.id(), "task revoke requested");
    Ok(Json(RevokeResponse {
        task_id: id,
        revoked,
    }))
}
