//! SSE event stream and connection management endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::Json;
use crewstream_realtime::{ConnectionId, Frame, RegistryStats, Transport};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::state::AppState;

use super::{not_found, ApiResult};

/// Response header carrying the new connection's id.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AckResponse {
    pub connection_id: Uuid,
    pub acknowledged: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisconnectResponse {
    pub connection_id: Uuid,
    pub disconnected: bool,
}

fn sse_event(frame: Frame) -> SseEvent {
    match frame {
        Frame::Event(event) => SseEvent::default()
            .event(event.event.as_str())
            .data(event.to_json()),
        Frame::KeepAlive => SseEvent::default().comment("keepalive"),
    }
}

/// Only the owner may touch a connection. Anyone else gets a 404.
fn require_owner(state: &AppState, id: &ConnectionId, user: &AuthUser) -> ApiResult<()> {
    match state.hub.registry().owner(id) {
        Some(owner) if owner == user.id() => Ok(()),
        _ => Err(not_found("connection", id)),
    }
}

/// Open an event stream for the calling user.
///
/// The first frame is a `connection` event whose `client_id` is the
/// connection id, also returned in the `X-Connection-Id` header.
#[utoipa::path(
    get,
    path = "/events/stream",
    tag = "Events",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Server-sent event stream", content_type = "text/event-stream"),
        (status = 401, description = "Missing user id", body = super::ErrorResponse)
    )
)]
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> impl IntoResponse {
    let broadcaster = state.hub.broadcaster();
    let id = broadcaster.connect(user.id(), Transport::Sse);
    info!(connection_id = %id, user_id = %user.id(), "SSE client connected");

    let frames = broadcaster
        .stream(id)
        .map(|frame| Ok::<_, Infallible>(sse_event(frame)));

    ([(CONNECTION_ID_HEADER, id.to_string())], Sse::new(frames))
}

/// Record a liveness acknowledgement for a connection.
#[utoipa::path(
    post,
    path = "/events/{connection_id}/ack",
    tag = "Events",
    params(
        ("connection_id" = uuid::Uuid, Path, description = "Connection id"),
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Acknowledged", body = AckResponse),
        (status = 404, description = "Unknown connection", body = super::ErrorResponse)
    )
)]
pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(connection_id): Path<ConnectionId>,
) -> ApiResult<Json<AckResponse>> {
    require_owner(&state, &connection_id, &user)?;
    let acknowledged = state.hub.registry().acknowledge(&connection_id);
    Ok(Json(AckResponse {
        connection_id,
        acknowledged,
    }))
}

/// Close a connection. A `disconnected` event is queued first, best effort.
#[utoipa::path(
    delete,
    path = "/events/{connection_id}",
    tag = "Events",
    params(
        ("connection_id" = uuid::Uuid, Path, description = "Connection id"),
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Disconnected", body = DisconnectResponse),
        (status = 404, description = "Unknown connection", body = super::ErrorResponse)
    )
)]
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(connection_id): Path<ConnectionId>,
) -> ApiResult<Json<DisconnectResponse>> {
    require_owner(&state, &connection_id, &user)?;
    let disconnected = state.hub.broadcaster().disconnect(&connection_id);
    info!(connection_id = %connection_id, user_id = %user.id(), "client requested disconnect");
    Ok(Json(DisconnectResponse {
        connection_id,
        disconnected,
    }))
}

#[utoipa::path(
    get,
    path = "/events/stats",
    tag = "Events",
    responses(
        (status = 200, description = "Live connection counts", body = RegistryStats)
    )
)]
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<RegistryStats> {
    Json(state.hub.stats())
}
