//! Execution dispatch, lookup, cancellation and cleanup.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use crewstream_core::{Execution, ExecutionStatus, NewExecution};
use crewstream_executor::{Session, CLEANUP_EXECUTION, EXECUTE_CREW};
use crewstream_queue::{TaskQueue, TaskRequest, MAINTENANCE_QUEUE};
use crewstream_realtime::EventSink;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::state::{AppState, Dispatch};

use super::{
    bad_request, error, execution_error, internal_error, not_found, queue_error, ApiResult,
};

pub const CANCELLED_BY_USER: &str = "cancelled by user";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchRequest {
    pub graph_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub trigger_message_id: Option<String>,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub inputs: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchResponse {
    pub execution_id: Uuid,
    pub task_id: Uuid,
    pub status: String,
}

/// The stored execution, if a worker has created it, and the queue's view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResponse {
    pub execution_id: Uuid,
    pub task_id: Option<Uuid>,
    pub task_status: Option<String>,
    pub execution: Option<Execution>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    pub execution_id: Uuid,
    /// Whether the queue task was revoked by this call.
    pub revoked: bool,
    /// `None` when no worker had created the execution yet.
    pub status: Option<ExecutionStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub execution_id: Uuid,
    pub task_id: Uuid,
}

/// Load the execution and check the caller owns it.
///
/// Ownership comes from the stored row, or from the dispatch record while
/// the task is still waiting for a worker.
async fn load_owned(
    state: &AppState,
    session: &mut dyn Session,
    id: Uuid,
    user: &AuthUser,
) -> ApiResult<(Option<Execution>, Option<Dispatch>)> {
    let execution = session.get_execution(&id).await.map_err(execution_error)?;
    let dispatch = state.dispatch_for(&id);
    let owner = execution
        .as_ref()
        .map(|e| e.user_id.as_str())
        .or_else(|| dispatch.as_ref().map(|d| d.user_id.as_str()));
    if owner != Some(user.id()) {
        return Err(not_found("execution", id));
    }
    Ok((execution, dispatch))
}

/// Queue a crew execution for the calling user.
#[utoipa::path(
    post,
    path = "/executions",
    tag = "Executions",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    request_body = DispatchRequest,
    responses(
        (status = 202, description = "Execution queued", body = DispatchResponse),
        (status = 400, description = "Invalid request", body = super::ErrorResponse),
        (status = 503, description = "Queue shutting down", body = super::ErrorResponse)
    )
)]
pub async fn dispatch_execution(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<(StatusCode, Json<DispatchResponse>)> {
    let graph_id = req.graph_id.trim();
    if graph_id.is_empty() {
        return Err(bad_request("graph_id must not be empty"));
    }

    let new = NewExecution {
        id: Uuid::new_v4(),
        graph_id: graph_id.to_string(),
        user_id: user.id().to_string(),
        thread_id: req.thread_id,
        trigger_message_id: req.trigger_message_id,
        priority: req.priority,
        config: req.config.unwrap_or_else(|| json!({})),
        inputs: req.inputs.unwrap_or_else(|| json!({})),
    };
    let args = serde_json::to_value(&new).map_err(internal_error)?;

    // Announced before enqueueing so it precedes anything the worker emits.
    state.hub.broadcaster().execution_start(&new);

    let request = TaskRequest::new(EXECUTE_CREW, args).with_priority(new.priority);
    let task_id = match state.queue.enqueue(request).await {
        Ok(id) => id,
        Err(e) => {
            warn!(execution_id = %new.id, error = %e, "failed to enqueue execution");
            return Err(queue_error(e));
        }
    };
    state.record_dispatch(
        new.id,
        Dispatch {
            task_id,
            user_id: new.user_id.clone(),
        },
    );
    info!(
        execution_id = %new.id,
        task_id = %task_id,
        graph_id = %new.graph_id,
        user_id = %new.user_id,
        "execution dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            execution_id: new.id,
            task_id,
            status: "queued".into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/executions/{id}",
    tag = "Executions",
    params(
        ("id" = uuid::Uuid, Path, description = "Execution id"),
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Execution and task state", body = ExecutionResponse),
        (status = 404, description = "Unknown execution", body = super::ErrorResponse)
    )
)]
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecutionResponse>> {
    let (execution, dispatch) = {
        let mut session = state.database.session().await.map_err(execution_error)?;
        load_owned(&state, &mut *session, id, &user).await?
    };

    let task_status = match &dispatch {
        Some(d) => Some(state.task_status.get_status(&d.task_id.to_string()).await.status),
        None => None,
    };
    Ok(Json(ExecutionResponse {
        execution_id: id,
        task_id: dispatch.map(|d| d.task_id),
        task_status,
        execution,
    }))
}

/// Revoke the queue task and move the execution to `cancelled`.
///
/// A running worker notices at its next checkpoint and stops.
#[utoipa::path(
    post,
    path = "/executions/{id}/cancel",
    tag = "Executions",
    params(
        ("id" = uuid::Uuid, Path, description = "Execution id"),
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Execution cancelled", body = CancelResponse),
        (status = 404, description = "Unknown execution", body = super::ErrorResponse),
        (status = 409, description = "Execution already finished", body = super::ErrorResponse)
    )
)]
pub async fn cancel_execution(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    let mut session = state.database.session().await.map_err(execution_error)?;
    let (execution, dispatch) = load_owned(&state, &mut *session, id, &user).await?;

    if let Some(execution) = &execution {
        if execution.status.is_terminal() {
            return Err(error(
                StatusCode::CONFLICT,
                format!("execution {id} is already {}", execution.status),
            ));
        }
    }

    let revoked = match &dispatch {
        Some(d) => state.queue.revoke(&d.task_id).await.map_err(queue_error)?,
        None => false,
    };

    let status = match execution {
        Some(mut execution) => {
            execution
                .cancel(CANCELLED_BY_USER)
                .map_err(|e| error(StatusCode::CONFLICT, e.to_string()))?;
            session
                .update_execution(&execution)
                .await
                .map_err(execution_error)?;
            state.hub.broadcaster().execution_status(&execution);
            Some(execution.status)
        }
        None => None,
    };
    drop(session);

    info!(execution_id = %id, revoked, user_id = %user.id(), "execution cancelled");
    Ok(Json(CancelResponse {
        execution_id: id,
        revoked,
        status,
    }))
}

/// Queue a cleanup check for the execution on the maintenance queue.
#[utoipa::path(
    post,
    path = "/executions/{id}/cleanup",
    tag = "Executions",
    params(
        ("id" = uuid::Uuid, Path, description = "Execution id"),
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 202, description = "Cleanup queued", body = CleanupResponse),
        (status = 404, description = "Unknown execution", body = super::ErrorResponse)
    )
)]
pub async fn cleanup_execution(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<CleanupResponse>)> {
    {
        let mut session = state.database.session().await.map_err(execution_error)?;
        load_owned(&state, &mut *session, id, &user).await?;
    }

    let request =
        TaskRequest::new(CLEANUP_EXECUTION, json!({ "execution_id": id })).on_queue(MAINTENANCE_QUEUE);
    let task_id = state.queue.enqueue(request).await.map_err(queue_error)?;
    state.record_task_owner(task_id, user.id());
    info!(execution_id = %id, task_id = %task_id, "execution cleanup queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(CleanupResponse {
            execution_id: id,
            task_id,
        }),
    ))
}
