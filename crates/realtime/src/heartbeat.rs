//! Periodic liveness pings and eviction of silent connections.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broadcaster::EventBroadcaster;
use crate::event::Event;

/// Missed intervals tolerated before a connection is evicted.
const MISSED_INTERVALS: u32 = 3;

/// Outcome of a single heartbeat pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub pinged: usize,
    pub evicted: usize,
}

/// A single repeating timer per process.
///
/// Each tick broadcasts a `heartbeat` event to every connection, then drops
/// connections whose last acknowledgement is older than three intervals.
pub struct HeartbeatMonitor {
    broadcaster: EventBroadcaster,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    pub fn new(broadcaster: EventBroadcaster, interval: Duration) -> Self {
        Self {
            broadcaster,
            interval: interval.max(Duration::from_millis(1)),
            handle: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Age after which a silent connection is evicted.
    pub fn eviction_window(&self) -> Duration {
        self.interval * MISSED_INTERVALS
    }

    /// Spawn the timer. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let broadcaster = self.broadcaster.clone();
        let interval = self.interval;
        let window = self.eviction_window();
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate first tick; connections were just accepted.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_tick(&broadcaster, window);
            }
        }));

        info!(interval = ?self.interval, window = ?window, "heartbeat monitor started");
        true
    }

    /// Cancel the timer. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.slot().take() {
            Some(handle) => {
                handle.abort();
                info!("heartbeat monitor stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Run one pass immediately, outside the timer.
    pub fn tick(&self) -> TickReport {
        run_tick(&self.broadcaster, self.eviction_window())
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }
}

fn run_tick(broadcaster: &EventBroadcaster, window: Duration) -> TickReport {
    let pinged = broadcaster.broadcast_to_all(&Event::heartbeat());

    let registry = broadcaster.registry();
    let stale = registry.stale_connections(window);
    let mut evicted = 0;
    for id in stale {
        if registry.disconnect(&id) {
            info!(connection_id = %id, "evicted connection after missed heartbeats");
            evicted += 1;
        }
    }

    debug!(pinged, evicted, remaining = registry.len(), "heartbeat tick");
    TickReport { pinged, evicted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::registry::{ConnectionRegistry, Transport};

    const INTERVAL: Duration = Duration::from_secs(30);

    fn monitor() -> HeartbeatMonitor {
        let registry = Arc::new(ConnectionRegistry::new(64));
        HeartbeatMonitor::new(EventBroadcaster::new(registry, Duration::from_secs(1)), INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_is_evicted_after_three_intervals() {
        let monitor = monitor();
        let registry = monitor.broadcaster.registry().clone();
        let silent = registry.connect("u1", Transport::Sse);
        let live = registry.connect("u1", Transport::WebSocket);

        assert!(monitor.start());
        for _ in 0..4 {
            tokio::time::sleep(INTERVAL).await;
            registry.acknowledge(&live);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        assert!(!registry.contains(&silent));
        assert!(registry.contains(&live));
        assert!(monitor.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn connection_survives_within_window() {
        let monitor = monitor();
        let registry = monitor.broadcaster.registry().clone();
        let id = registry.connect("u1", Transport::Sse);

        assert!(monitor.start());
        tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert!(registry.contains(&id));
        // Two heartbeats plus nothing else queued.
        assert_eq!(registry.queued(&id), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_cancels() {
        let monitor = monitor();
        assert!(!monitor.is_running());
        assert!(monitor.start());
        assert!(!monitor.start());
        assert!(monitor.is_running());

        assert!(monitor.stop());
        assert!(!monitor.stop());
        assert!(!monitor.is_running());
        assert!(monitor.start());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_tick_reports_counts() {
        let monitor = monitor();
        let registry = monitor.broadcaster.registry().clone();
        registry.connect("u1", Transport::Sse);
        registry.connect("u2", Transport::Sse);

        assert_eq!(monitor.tick(), TickReport { pinged: 2, evicted: 0 });
        tokio::time::advance(monitor.eviction_window() + Duration::from_secs(1)).await;
        assert_eq!(monitor.tick(), TickReport { pinged: 2, evicted: 2 });
        assert!(registry.is_empty());
    }
}
