//! HTTP router construction: routes, CORS and API docs.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::permissive().allow_origin(AllowOrigin::exact(value)),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health::health))
        .route("/config", get(api::health::config))
        // Real-time events
        .route("/events/stream", get(api::events::stream_events))
        .route("/events/ws", get(api::ws::ws_events))
        .route("/events/stats", get(api::events::stats))
        .route(
            "/events/{connection_id}",
            axum::routing::delete(api::events::disconnect),
        )
        .route("/events/{connection_id}/ack", post(api::events::acknowledge))
        // Executions
        .route("/executions", post(api::executions::dispatch_execution))
        .route("/executions/{id}", get(api::executions::get_execution))
        .route(
            "/executions/{id}/cancel",
            post(api::executions::cancel_execution),
        )
        .route(
            "/executions/{id}/cleanup",
            post(api::executions::cleanup_execution),
        )
        // Queue tasks
        .route(
            "/tasks/{task_id}",
            get(api::tasks::task_status).delete(api::tasks::revoke_task),
        )
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}
