//! OpenAPI documentation aggregator, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "crewstream API",
        version = "0.1.0",
        description = "Crew execution dispatch with real-time lifecycle events over SSE and WebSocket.",
    ),
    tags(
        (name = "Health", description = "Liveness and redacted configuration"),
        (name = "Events", description = "SSE and WebSocket event streams, acknowledgements and connection stats"),
        (name = "Executions", description = "Dispatch, inspect, cancel and clean up crew executions"),
        (name = "Tasks", description = "Queue task status and revocation"),
    ),
    paths(
        // Health
        crate::api::health::health,
        crate::api::health::config,
        // Events
        crate::api::events::stream_events,
        crate::api::ws::ws_events,
        crate::api::events::acknowledge,
        crate::api::events::disconnect,
        crate::api::events::stats,
        // Executions
        crate::api::executions::dispatch_execution,
        crate::api::executions::get_execution,
        crate::api::executions::cancel_execution,
        crate::api::executions::cleanup_execution,
        // Tasks
        crate::api::tasks::task_status,
        crate::api::tasks::revoke_task,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::events::AckResponse,
        crate::api::events::DisconnectResponse,
        crate::api::executions::DispatchRequest,
        crate::api::executions::DispatchResponse,
        crate::api::executions::ExecutionResponse,
        crate::api::executions::CancelResponse,
        crate::api::executions::CleanupResponse,
        crate::api::tasks::RevokeResponse,
        crewstream_core::Execution,
        crewstream_core::ExecutionStatus,
        crewstream_queue::TaskStatusReport,
        crewstream_queue::QueueStats,
        crewstream_queue::LaneStats,
        crewstream_realtime::RegistryStats,
    ))
)]
pub struct ApiDoc;
