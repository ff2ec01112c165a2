//! Real-time event fan-out over SSE and WebSocket.
//!
//! [`ConnectionRegistry`] owns every live connection of this process,
//! [`EventBroadcaster`] fans typed [`Event`]s out to them, and
//! [`HeartbeatMonitor`] prunes connections that stop draining. [`RealtimeHub`]
//! ties the three together with an explicit start/shutdown lifecycle.
//!
//! Delivery is process-local: a broadcast only reaches connections attached
//! to the process that publishes it.

pub mod broadcaster;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod hub;
pub mod registry;
pub mod stream;
pub mod wire;

pub use broadcaster::{EventBroadcaster, EventSink};
pub use error::RealtimeError;
pub use event::{Event, EventPayload, EventType};
pub use heartbeat::HeartbeatMonitor;
pub use hub::RealtimeHub;
pub use registry::{ConnectionId, ConnectionRegistry, RegistryStats, Transport};
pub use stream::EventStream;
pub use wire::{ClientMessage, Frame, ServerControl};
