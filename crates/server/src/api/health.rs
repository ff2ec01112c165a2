//! Health and configuration endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use crewstream_queue::QueueStats;
use crewstream_realtime::RegistryStats;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub profile: String,
    pub database: &'static str,
    pub heartbeat_running: bool,
    pub connections: RegistryStats,
    pub queue: QueueStats,
}

/// Liveness plus a snapshot of connections and queue load.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        profile: state.config.profile_label().to_string(),
        database: state.database.name(),
        heartbeat_running: state.hub.heartbeat().is_running(),
        connections: state.hub.stats(),
        queue: state.queue.stats(),
    })
}

/// Active configuration with credentials left out.
#[utoipa::path(
    get,
    path = "/config",
    tag = "Health",
    responses(
        (status = 200, description = "Redacted configuration", body = Object)
    )
)]
pub async fn config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.config.redacted_summary())
}
