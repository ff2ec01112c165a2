//! Server startup: backend selection, task registration and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crewstream_core::config::QueueConfig;
use crewstream_core::Config;
use crewstream_executor::{
    register_tasks, CleanupTask, CrewEngine, Database, DisabledCrewEngine, ExecutionTask,
    MemoryDatabase, PgDatabase, RemoteCrewEngine,
};
use crewstream_queue::{LocalTaskQueue, DEFAULT_QUEUE, MAINTENANCE_QUEUE};
use crewstream_realtime::RealtimeHub;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Pick the database and crew engine from config, then wire everything together.
pub async fn build_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    check_queue_lanes(&config.queue).context("invalid queue configuration")?;

    let database: Arc<dyn Database> = if config.postgres.is_configured() {
        let pg = PgDatabase::connect(&config.postgres)
            .await
            .context("failed to connect to PostgreSQL")?;
        Arc::new(pg)
    } else {
        let graphs = config.storage.graphs_file();
        warn!(
            graphs_file = %graphs.display(),
            "PostgreSQL not configured (PG_USERNAME unset), using in-memory database"
        );
        let memory = MemoryDatabase::load(&graphs)
            .with_context(|| format!("failed to load graphs from {}", graphs.display()))?;
        Arc::new(memory)
    };

    let engine: Arc<dyn CrewEngine> = match config.executor.crew_engine_url.as_deref() {
        Some(url) => {
            info!(url, "remote crew engine configured");
            Arc::new(RemoteCrewEngine::new(url, config.executor.crew_timeout()))
        }
        None => {
            warn!("CREW_ENGINE_URL not set, every execution will fail at translation");
            Arc::new(DisabledCrewEngine)
        }
    };

    Ok(assemble(config, database, engine))
}

/// Dispatch and cleanup always target these two lanes.
pub fn check_queue_lanes(config: &QueueConfig) -> anyhow::Result<()> {
    for lane in [DEFAULT_QUEUE, MAINTENANCE_QUEUE] {
        anyhow::ensure!(
            config.names.iter().any(|name| name == lane),
            "QUEUE_NAMES must include {lane:?} (got {:?})",
            config.names
        );
    }
    Ok(())
}

/// Build state around explicit collaborators. Nothing is started yet.
pub fn assemble(
    config: Config,
    database: Arc<dyn Database>,
    engine: Arc<dyn CrewEngine>,
) -> Arc<AppState> {
    let hub = RealtimeHub::new(&config.realtime);
    let queue = Arc::new(LocalTaskQueue::new(&config.queue));

    let execute = ExecutionTask::new(
        database.clone(),
        engine,
        Arc::new(hub.broadcaster().clone()),
        &config.executor,
    );
    let cleanup = CleanupTask::new(database.clone());
    register_tasks(&queue, Arc::new(execute), Arc::new(cleanup));

    info!(
        database = database.name(),
        queues = ?queue.queue_names(),
        "application state assembled"
    );
    Arc::new(AppState::new(config, hub, queue, database))
}

/// Spawn queue workers, the heartbeat timer and the dispatch pruner.
pub fn start_background(state: &Arc<AppState>) {
    state.queue.start();
    state.hub.start();

    let period = state
        .config
        .queue
        .result_ttl()
        .clamp(Duration::from_secs(1), Duration::from_secs(60));
    let weak = Arc::downgrade(state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(state) = weak.upgrade() else { break };
            let pruned = state.prune_dispatches();
            if pruned > 0 {
                debug!(pruned, "expired dispatch records dropped");
            }
        }
    });
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Close live connections so open streams end.
pub fn close_connections(state: &AppState) {
    let dropped = state.hub.shutdown();
    info!(dropped, "realtime connections closed");
}

/// Stop workers, letting in-flight tasks run for up to `grace`.
pub async fn drain_queue(state: &AppState, grace: Duration) {
    state.queue.shutdown(grace).await;
    info!("task queue drained");
}
