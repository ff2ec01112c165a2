//! Transport framing for SSE and WebSocket.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// One item pulled from an [`EventStream`](crate::EventStream).
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(Event),
    /// Emitted when no event arrived within the poll interval.
    KeepAlive,
}

impl Frame {
    /// WebSocket text payload. Keepalives have none; WebSocket has its own pings.
    pub fn to_ws_text(&self) -> Option<String> {
        match self {
            Frame::Event(event) => Some(event.to_json()),
            Frame::KeepAlive => None,
        }
    }
}

/// Messages a WebSocket client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

/// Control replies sent over WebSocket, outside the event envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerControl {
    Pong,
}

impl ServerControl {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
