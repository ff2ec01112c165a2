//! Fan-out of events to registered connections.
//!
//! A failed send never aborts a broadcast: the offending connection is
//! dropped from the registry and delivery continues with the rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crewstream_core::{Execution, NewExecution};
use tracing::{debug, warn};

use crate::event::{
    ConnectionStatus, Event, ExecutionComplete, ExecutionFailure, ExecutionProgress,
    ExecutionStart, ExecutionStatusUpdate,
};
use crate::registry::{ConnectionId, ConnectionRegistry, Transport};
use crate::stream::EventStream;

/// Anything that can deliver an event to a user's live connections.
///
/// Implemented by [`EventBroadcaster`]; workers depend on this seam so they
/// can run without a transport attached.
pub trait EventSink: Send + Sync {
    /// Deliver to every connection of `user_id`. Returns how many accepted it.
    fn publish(&self, user_id: &str, event: Event) -> usize;

    // ── Typed lifecycle helpers ──────────────────────────────────────

    /// Announce a dispatched execution. Sent before the worker picks it up.
    fn execution_start(&self, new: &NewExecution) -> usize {
        let payload = ExecutionStart {
            execution_id: new.id,
            user_id: new.user_id.clone(),
            graph_id: new.graph_id.clone(),
            thread_id: new.thread_id.clone(),
            inputs: new.inputs.clone(),
            started_at: Utc::now(),
        };
        self.publish(&new.user_id, Event::new(&payload))
    }

    fn execution_progress(
        &self,
        execution: &Execution,
        percentage: f64,
        step: &str,
        message: Option<&str>,
    ) -> usize {
        let mut payload =
            ExecutionProgress::new(execution.id, execution.user_id.as_str(), percentage, step);
        if let Some(message) = message {
            payload = payload.with_message(message);
        }
        self.publish(&execution.user_id, Event::new(&payload))
    }

    /// Snapshot of the execution's current status fields.
    fn execution_status(&self, execution: &Execution) -> usize {
        let payload = ExecutionStatusUpdate {
            execution_id: execution.id,
            user_id: execution.user_id.clone(),
            status: execution.status,
            progress_percentage: Some(execution.progress_percentage),
            current_step: execution.current_step.clone(),
            error_message: execution.error_message.clone(),
            result_data: execution.result.clone(),
            graph_id: execution.graph_id.clone(),
            thread_id: execution.thread_id.clone(),
        };
        self.publish(&execution.user_id, Event::new(&payload))
    }

    fn execution_complete(&self, execution: &Execution) -> usize {
        let payload = ExecutionComplete {
            execution_id: execution.id,
            user_id: execution.user_id.clone(),
            result: execution.result.clone().unwrap_or(serde_json::Value::Null),
            duration_seconds: execution.duration_seconds,
            completed_at: execution.completed_at.unwrap_or_else(Utc::now),
        };
        self.publish(&execution.user_id, Event::new(&payload))
    }

    fn execution_error(&self, execution: &Execution) -> usize {
        let payload = ExecutionFailure {
            execution_id: execution.id,
            user_id: execution.user_id.clone(),
            error_message: execution
                .error_message
                .clone()
                .unwrap_or_else(|| "execution failed".to_string()),
            error_details: execution.error_details.clone(),
            failed_at: execution.completed_at.unwrap_or_else(Utc::now),
        };
        self.publish(&execution.user_id, Event::new(&payload))
    }
}

/// Blanket implementation so `Arc<dyn EventSink>` can be used directly.
impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, user_id: &str, event: Event) -> usize {
        (**self).publish(user_id, event)
    }
}

#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
    poll_interval: Duration,
}

impl EventBroadcaster {
    /// `poll_interval` is the longest a stream waits before emitting a keepalive.
    pub fn new(registry: Arc<ConnectionRegistry>, poll_interval: Duration) -> Self {
        Self {
            registry,
            poll_interval,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register a connection and greet it with a `connected` event.
    pub fn connect(&self, user_id: &str, transport: Transport) -> ConnectionId {
        let id = self.registry.connect(user_id, transport);
        self.send_to_connection(
            &id,
            Event::connection(ConnectionStatus::Connected, "connected to event stream", id),
        );
        id
    }

    /// Say goodbye (best effort) and tear the connection down.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let _ = self.registry.send(
            id,
            Event::connection(ConnectionStatus::Disconnected, "connection closed by server", *id),
        );
        self.registry.disconnect(id)
    }

    /// Send to one connection. A failed send drops that connection.
    pub fn send_to_connection(&self, id: &ConnectionId, event: Event) -> bool {
        match self.registry.send(id, event) {
            Ok(()) => self.registry.contains(id),
            Err(e) => {
                warn!(connection_id = %id, error = %e, "dropping connection after failed send");
                self.registry.disconnect(id);
                false
            }
        }
    }

    /// Deliver to every connection of `user_id`. Returns the delivered count.
    pub fn broadcast_to_user(&self, user_id: &str, event: &Event) -> usize {
        let targets = self.registry.connections_for_user(user_id);
        if targets.is_empty() {
            debug!(user_id, event = %event.event, "no connections for user");
            return 0;
        }
        self.deliver(targets, event)
    }

    /// Deliver to every registered connection. Returns the delivered count.
    pub fn broadcast_to_all(&self, event: &Event) -> usize {
        let targets = self.registry.all_connections();
        self.deliver(targets, event)
    }

    fn deliver(&self, targets: impl IntoIterator<Item = ConnectionId>, event: &Event) -> usize {
        let mut delivered = 0;
        for id in targets {
            if self.send_to_connection(&id, event.clone()) {
                delivered += 1;
            }
        }
        debug!(event = %event.event, delivered, "event broadcast");
        delivered
    }

    /// The frame stream for one connection. Dropping it removes the connection.
    pub fn stream(&self, id: ConnectionId) -> EventStream {
        EventStream::new(self.registry.clone(), id, self.poll_interval)
    }
}

impl EventSink for EventBroadcaster {
    fn publish(&self, user_id: &str, event: Event) -> usize {
        self.broadcast_to_user(user_id, &event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ExecutionProgress;
    use uuid::Uuid;

    fn broadcaster(capacity: usize) -> EventBroadcaster {
        EventBroadcaster::new(
            Arc::new(ConnectionRegistry::new(capacity)),
            Duration::from_secs(1),
        )
    }

    fn drain(b: &EventBroadcaster, id: &ConnectionId) -> Vec<Event> {
        let mut rx = b.registry().take_receiver(id).expect("receiver available");
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn broadcast_to_user_enqueues_once_per_connection() {
        let b = broadcaster(8);
        let ids: Vec<_> = (0..3).map(|_| b.registry().connect("u1", Transport::Sse)).collect();
        let other = b.registry().connect("u2", Transport::Sse);

        let event = Event::new(&ExecutionProgress::new(Uuid::new_v4(), "u1", 10.0, "plan"));
        assert_eq!(b.broadcast_to_user("u1", &event), 3);

        for id in &ids {
            let received = drain(&b, id);
            assert_eq!(received, vec![event.clone()]);
            assert_eq!(received[0].event.as_str(), "execution_progress");
        }
        assert!(drain(&b, &other).is_empty());
    }

    #[test]
    fn broadcast_to_user_without_connections_is_a_no_op() {
        let b = broadcaster(8);
        b.registry().connect("someone-else", Transport::Sse);
        assert_eq!(b.broadcast_to_user("u1", &Event::heartbeat()), 0);
        assert_eq!(b.registry().len(), 1);
    }

    #[test]
    fn failing_connection_is_dropped_without_blocking_others() {
        let b = broadcaster(1);
        let slow = b.registry().connect("u1", Transport::Sse);
        let healthy = b.registry().connect("u1", Transport::Sse);

        // Fill the slow consumer's single slot, keep the healthy one empty.
        b.registry().send(&slow, Event::heartbeat()).unwrap();
        let event = Event::heartbeat();
        assert_eq!(b.broadcast_to_user("u1", &event), 1);

        assert!(!b.registry().contains(&slow));
        assert!(b.registry().contains(&healthy));
        assert_eq!(drain(&b, &healthy), vec![event]);
    }

    #[test]
    fn broadcast_to_all_reaches_every_user() {
        let b = broadcaster(4);
        let a = b.registry().connect("u1", Transport::Sse);
        let c = b.registry().connect("u2", Transport::WebSocket);
        assert_eq!(b.broadcast_to_all(&Event::heartbeat()), 2);
        assert_eq!(drain(&b, &a).len(), 1);
        assert_eq!(drain(&b, &c).len(), 1);
    }

    #[test]
    fn connect_greets_and_disconnect_removes() {
        let b = broadcaster(4);
        let id = b.connect("u1", Transport::WebSocket);
        assert!(b.disconnect(&id));
        assert!(!b.disconnect(&id));
        assert!(b.registry().connections_for_user("u1").is_empty());
    }

    #[test]
    fn typed_helpers_target_the_owning_user() {
        use crewstream_core::ExecutionStatus;

        let b = broadcaster(8);
        let id = b.registry().connect("u1", Transport::Sse);
        let new = NewExecution {
            id: Uuid::new_v4(),
            graph_id: "g1".into(),
            user_id: "u1".into(),
            thread_id: Some("t1".into()),
            trigger_message_id: None,
            priority: 0,
            config: serde_json::json!({}),
            inputs: serde_json::json!({"topic": "rust"}),
        };
        assert_eq!(b.execution_start(&new), 1);

        let mut execution = Execution::new(new.clone());
        execution.start().unwrap();
        assert_eq!(b.execution_progress(&execution, 150.0, "research", Some("half way")), 1);
        execution
            .complete(serde_json::json!({"result": "ok"}), Duration::from_millis(5))
            .unwrap();
        assert_eq!(b.execution_status(&execution), 1);
        assert_eq!(b.execution_complete(&execution), 1);

        let events = drain(&b, &id);
        let kinds: Vec<_> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["execution_start", "execution_progress", "execution_status", "execution_complete"]
        );

        let start: ExecutionStart = events[0].decode().unwrap();
        assert_eq!(start.execution_id, new.id);
        assert_eq!(start.thread_id.as_deref(), Some("t1"));
        let progress: ExecutionProgress = events[1].decode().unwrap();
        assert_eq!(progress.progress_percentage, 100.0);
        let status: ExecutionStatusUpdate = events[2].decode().unwrap();
        assert_eq!(status.status, ExecutionStatus::Completed);
        assert_eq!(status.result_data, Some(serde_json::json!({"result": "ok"})));
    }

    #[test]
    fn sink_publishes_to_user() {
        let b = broadcaster(4);
        let id = b.registry().connect("u1", Transport::Sse);
        let sink: Arc<dyn EventSink> = Arc::new(b.clone());
        assert_eq!(sink.publish("u1", Event::heartbeat()), 1);
        assert_eq!(drain(&b, &id).len(), 1);
    }
}
