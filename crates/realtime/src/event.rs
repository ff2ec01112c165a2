//! Event envelope and typed payloads.
//!
//! Every event travels as `{"event": <type>, "timestamp": ..., "data": {...}}`.
//! The `data` object is one of the payload structs below, selected by `event`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crewstream_core::ExecutionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ExecutionStart,
    ExecutionProgress,
    ExecutionStatus,
    ExecutionComplete,
    ExecutionError,
    Connection,
    Heartbeat,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionStart => "execution_start",
            Self::ExecutionProgress => "execution_progress",
            Self::ExecutionStatus => "execution_status",
            Self::ExecutionComplete => "execution_complete",
            Self::ExecutionError => "execution_error",
            Self::Connection => "connection",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload struct that knows which event type carries it.
pub trait EventPayload: Serialize {
    const EVENT_TYPE: EventType;
}

/// Wire envelope for a single event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl Event {
    /// Wrap a typed payload, stamping the current time.
    pub fn new<P: EventPayload>(payload: &P) -> Self {
        Self {
            event: P::EVENT_TYPE,
            timestamp: Utc::now(),
            data: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Deserialize `data` into the expected payload type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn heartbeat() -> Self {
        Self::new(&Heartbeat {
            message: "heartbeat".to_string(),
            server_time: Utc::now(),
        })
    }

    pub fn connection(status: ConnectionStatus, message: impl Into<String>, client_id: Uuid) -> Self {
        Self::new(&ConnectionNotice {
            status,
            message: message.into(),
            client_id,
        })
    }
}

// ── Execution payloads ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStart {
    pub execution_id: Uuid,
    pub user_id: String,
    pub graph_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub inputs: serde_json::Value,
    pub started_at: DateTime<Utc>,
}

impl EventPayload for ExecutionStart {
    const EVENT_TYPE: EventType = EventType::ExecutionStart;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    pub execution_id: Uuid,
    pub user_id: String,
    /// 0–100 inclusive.
    pub progress_percentage: f64,
    pub current_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionProgress {
    pub fn new(
        execution_id: Uuid,
        user_id: impl Into<String>,
        progress_percentage: f64,
        current_step: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            user_id: user_id.into(),
            progress_percentage: progress_percentage.clamp(0.0, 100.0),
            current_step: current_step.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl EventPayload for ExecutionProgress {
    const EVENT_TYPE: EventType = EventType::ExecutionProgress;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatusUpdate {
    pub execution_id: Uuid,
    pub user_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<serde_json::Value>,
    pub graph_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl EventPayload for ExecutionStatusUpdate {
    const EVENT_TYPE: EventType = EventType::ExecutionStatus;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionComplete {
    pub execution_id: Uuid,
    pub user_id: String,
    pub result: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub completed_at: DateTime<Utc>,
}

impl EventPayload for ExecutionComplete {
    const EVENT_TYPE: EventType = EventType::ExecutionComplete;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub execution_id: Uuid,
    pub user_id: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
    pub failed_at: DateTime<Utc>,
}

impl EventPayload for ExecutionFailure {
    const EVENT_TYPE: EventType = EventType::ExecutionError;
}

// ── Transport payloads ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionNotice {
    pub status: ConnectionStatus,
    pub message: String,
    pub client_id: Uuid,
}

impl EventPayload for ConnectionNotice {
    const EVENT_TYPE: EventType = EventType::Connection;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub message: String,
    pub server_time: DateTime<Utc>,
}

impl EventPayload for Heartbeat {
    const EVENT_TYPE: EventType = EventType::Heartbeat;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_type_and_payload() {
        let id = Uuid::new_v4();
        let event = Event::new(&ExecutionProgress::new(id, "u1", 42.0, "research"));
        assert_eq!(event.event, EventType::ExecutionProgress);

        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["event"], "execution_progress");
        assert_eq!(json["data"]["execution_id"], id.to_string());
        assert_eq!(json["data"]["progress_percentage"], 42.0);
        assert!(json["data"].get("message").is_none());

        let decoded: ExecutionProgress = event.decode().unwrap();
        assert_eq!(decoded.current_step, "research");
    }

    #[test]
    fn progress_is_clamped_to_percentage_range() {
        let p = ExecutionProgress::new(Uuid::new_v4(), "u1", 250.0, "x").with_message("done-ish");
        assert_eq!(p.progress_percentage, 100.0);
        assert_eq!(p.message.as_deref(), Some("done-ish"));
    }

    #[test]
    fn heartbeat_and_connection_shapes() {
        let hb = Event::heartbeat();
        assert_eq!(hb.event, EventType::Heartbeat);
        assert_eq!(hb.data["message"], "heartbeat");
        assert!(hb.data.get("server_time").is_some());

        let client = Uuid::new_v4();
        let conn = Event::connection(ConnectionStatus::Connected, "welcome", client);
        let notice: ConnectionNotice = conn.decode().unwrap();
        assert_eq!(notice.status, ConnectionStatus::Connected);
        assert_eq!(notice.client_id, client);
    }

    #[test]
    fn status_update_serializes_status_name() {
        let event = Event::new(&ExecutionStatusUpdate {
            execution_id: Uuid::new_v4(),
            user_id: "u1".into(),
            status: ExecutionStatus::Completed,
            progress_percentage: Some(100.0),
            current_step: None,
            error_message: None,
            result_data: Some(serde_json::json!({"result": "hello"})),
            graph_id: "g1".into(),
            thread_id: None,
        });
        assert_eq!(event.data["status"], "completed");
        assert_eq!(event.data["result_data"]["result"], "hello");
    }
}
