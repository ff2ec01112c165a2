//! Process-local connection table.
//!
//! One mutex guards both the flat `id → connection` map and the
//! `user → {ids}` index, so the two never disagree. Sends clone the channel
//! sender out of the lock and enqueue without holding it.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RealtimeError;
use crate::event::Event;

pub type ConnectionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Sse,
    WebSocket,
}

struct Connection {
    user_id: String,
    transport: Transport,
    sender: mpsc::Sender<Event>,
    /// Handed to exactly one stream, then `None`.
    receiver: Option<mpsc::Receiver<Event>>,
    created_at: DateTime<Utc>,
    last_heartbeat_at: Instant,
}

impl Connection {
    fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

#[derive(Default)]
struct Tables {
    connections: HashMap<ConnectionId, Connection>,
    by_user: HashMap<String, HashSet<ConnectionId>>,
}

impl Tables {
    fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        let conn = self.connections.remove(id)?;
        if let Some(ids) = self.by_user.get_mut(&conn.user_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_user.remove(&conn.user_id);
            }
        }
        Some(conn)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub users: usize,
    pub sse_connections: usize,
    pub websocket_connections: usize,
    /// Events sitting in connection channels, not yet pulled by a stream.
    pub queued_events: usize,
}

pub struct ConnectionRegistry {
    tables: Mutex<Tables>,
    capacity: usize,
}

impl ConnectionRegistry {
    /// `capacity` bounds each connection's outbound queue.
    pub fn new(capacity: usize) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn connect(&self, user_id: &str, transport: Transport) -> ConnectionId {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.capacity);
        let conn = Connection {
            user_id: user_id.to_string(),
            transport,
            sender,
            receiver: Some(receiver),
            created_at: Utc::now(),
            last_heartbeat_at: Instant::now(),
        };

        let total = {
            let mut tables = self.lock();
            tables.connections.insert(id, conn);
            tables.by_user.entry(user_id.to_string()).or_default().insert(id);
            tables.connections.len()
        };

        info!(connection_id = %id, user_id, ?transport, total, "connection registered");
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(conn) => {
                let lifetime_secs = (Utc::now() - conn.created_at).num_seconds();
                info!(connection_id = %id, user_id = %conn.user_id, lifetime_secs, "connection removed");
                true
            }
            None => false,
        }
    }

    /// Enqueue an event without waiting. Unknown ids are ignored.
    pub fn send(&self, id: &ConnectionId, event: Event) -> Result<(), RealtimeError> {
        let sender = match self.lock().connections.get(id) {
            Some(conn) => conn.sender.clone(),
            None => return Ok(()),
        };

        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => RealtimeError::Overflow(*id),
            TrySendError::Closed(_) => RealtimeError::ConnectionLost(*id),
        })
    }

    /// Copy of the user's connection ids, safe to iterate while others mutate.
    pub fn connections_for_user(&self, user_id: &str) -> HashSet<ConnectionId> {
        self.lock().by_user.get(user_id).cloned().unwrap_or_default()
    }

    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.lock().connections.keys().copied().collect()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.lock().connections.contains_key(id)
    }

    pub fn owner(&self, id: &ConnectionId) -> Option<String> {
        self.lock().connections.get(id).map(|c| c.user_id.clone())
    }

    /// Mark the connection as alive. Returns `false` for unknown ids.
    pub fn acknowledge(&self, id: &ConnectionId) -> bool {
        match self.lock().connections.get_mut(id) {
            Some(conn) => {
                conn.last_heartbeat_at = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Connections whose last acknowledgement is older than `max_age`.
    pub fn stale_connections(&self, max_age: Duration) -> Vec<ConnectionId> {
        let now = Instant::now();
        self.lock()
            .connections
            .iter()
            .filter(|(_, c)| now.saturating_duration_since(c.last_heartbeat_at) > max_age)
            .map(|(id, _)| *id)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn queued(&self, id: &ConnectionId) -> Option<usize> {
        self.lock().connections.get(id).map(Connection::queued)
    }

    pub(crate) fn take_receiver(&self, id: &ConnectionId) -> Option<mpsc::Receiver<Event>> {
        self.lock().connections.get_mut(id).and_then(|c| c.receiver.take())
    }

    pub fn len(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        let tables = self.lock();
        let sse = tables
            .connections
            .values()
            .filter(|c| c.transport == Transport::Sse)
            .count();
        RegistryStats {
            total_connections: tables.connections.len(),
            users: tables.by_user.len(),
            sse_connections: sse,
            websocket_connections: tables.connections.len() - sse,
            queued_events: tables.connections.values().map(Connection::queued).sum(),
        }
    }

    /// Drop every connection. Their streams end once drained.
    pub fn shutdown(&self) -> usize {
        let mut tables = self.lock();
        let count = tables.connections.len();
        tables.connections.clear();
        tables.by_user.clear();
        debug!(count, "registry cleared");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_indexes_by_user() {
        let registry = ConnectionRegistry::new(8);
        let a = registry.connect("u1", Transport::Sse);
        let b = registry.connect("u1", Transport::WebSocket);
        let c = registry.connect("u2", Transport::Sse);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.connections_for_user("u1"), HashSet::from([a, b]));
        assert_eq!(registry.connections_for_user("u2"), HashSet::from([c]));
        assert_eq!(registry.owner(&c).as_deref(), Some("u2"));
        assert_eq!(
            registry.stats(),
            RegistryStats {
                total_connections: 3,
                users: 2,
                sse_connections: 2,
                websocket_connections: 1,
                queued_events: 0,
            }
        );
        registry.send(&a, Event::heartbeat()).unwrap();
        registry.send(&c, Event::heartbeat()).unwrap();
        assert_eq!(registry.stats().queued_events, 2);
    }

    #[test]
    fn disconnect_is_idempotent_and_prunes_user_index() {
        let registry = ConnectionRegistry::new(8);
        let a = registry.connect("u1", Transport::Sse);

        assert!(registry.disconnect(&a));
        assert!(!registry.disconnect(&a));
        assert!(!registry.disconnect(&Uuid::new_v4()));
        assert!(registry.connections_for_user("u1").is_empty());
        assert_eq!(registry.stats().users, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn interleaved_connects_never_leak_disconnected_ids() {
        let registry = ConnectionRegistry::new(4);
        let mut live: HashSet<ConnectionId> = HashSet::new();

        for round in 0..50u32 {
            let id = registry.connect("u1", Transport::Sse);
            live.insert(id);
            if round % 3 == 0 {
                let victim = *live.iter().next().unwrap();
                registry.disconnect(&victim);
                live.remove(&victim);
            }
            let snapshot = registry.connections_for_user("u1");
            assert_eq!(snapshot, live);
        }
    }

    #[test]
    fn send_to_unknown_connection_is_silent() {
        let registry = ConnectionRegistry::new(2);
        assert_eq!(registry.send(&Uuid::new_v4(), Event::heartbeat()), Ok(()));
    }

    #[test]
    fn full_channel_reports_overflow() {
        let registry = ConnectionRegistry::new(2);
        let id = registry.connect("u1", Transport::Sse);

        registry.send(&id, Event::heartbeat()).unwrap();
        registry.send(&id, Event::heartbeat()).unwrap();
        assert_eq!(registry.queued(&id), Some(2));
        assert_eq!(
            registry.send(&id, Event::heartbeat()),
            Err(RealtimeError::Overflow(id))
        );
    }

    #[test]
    fn dropped_receiver_reports_connection_lost() {
        let registry = ConnectionRegistry::new(2);
        let id = registry.connect("u1", Transport::WebSocket);
        drop(registry.take_receiver(&id));

        assert_eq!(
            registry.send(&id, Event::heartbeat()),
            Err(RealtimeError::ConnectionLost(id))
        );
    }

    #[test]
    fn receiver_is_handed_out_once() {
        let registry = ConnectionRegistry::new(2);
        let id = registry.connect("u1", Transport::Sse);
        assert!(registry.take_receiver(&id).is_some());
        assert!(registry.take_receiver(&id).is_none());
        assert!(registry.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_connections_respect_acknowledgements() {
        let registry = ConnectionRegistry::new(2);
        let quiet = registry.connect("u1", Transport::Sse);
        let chatty = registry.connect("u1", Transport::Sse);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(registry.acknowledge(&chatty));
        tokio::time::advance(Duration::from_secs(15)).await;

        let stale = registry.stale_connections(Duration::from_secs(30));
        assert_eq!(stale, vec![quiet]);
        assert!(!registry.acknowledge(&Uuid::new_v4()));
    }

    #[test]
    fn shutdown_clears_everything() {
        let registry = ConnectionRegistry::new(2);
        registry.connect("u1", Transport::Sse);
        registry.connect("u2", Transport::WebSocket);
        assert_eq!(registry.shutdown(), 2);
        assert!(registry.is_empty());
        assert!(registry.all_connections().is_empty());
    }
}
