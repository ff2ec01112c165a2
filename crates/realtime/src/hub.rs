//! Process-wide owner of the realtime components.

use std::sync::Arc;

use crewstream_core::config::RealtimeConfig;
use tracing::info;

use crate::broadcaster::EventBroadcaster;
use crate::heartbeat::HeartbeatMonitor;
use crate::registry::{ConnectionRegistry, RegistryStats};

/// Registry, broadcaster and heartbeat monitor with one lifecycle.
///
/// Construct once at startup, call [`start`](Self::start) inside the runtime,
/// and [`shutdown`](Self::shutdown) before exit.
pub struct RealtimeHub {
    registry: Arc<ConnectionRegistry>,
    broadcaster: EventBroadcaster,
    heartbeat: HeartbeatMonitor,
}

impl RealtimeHub {
    pub fn new(config: &RealtimeConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.channel_capacity));
        let broadcaster = EventBroadcaster::new(registry.clone(), config.poll_interval());
        let heartbeat = HeartbeatMonitor::new(broadcaster.clone(), config.heartbeat_interval());
        Self {
            registry,
            broadcaster,
            heartbeat,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Start the heartbeat timer. Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.heartbeat.start() {
            info!(
                capacity = self.registry.capacity(),
                "realtime hub started"
            );
        }
    }

    /// Stop the timer and release every connection. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        self.heartbeat.stop();
        let dropped = self.registry.shutdown();
        info!(dropped, "realtime hub shut down");
        dropped
    }
}
