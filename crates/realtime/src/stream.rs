//! Per-connection frame stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::Event;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::wire::Frame;

/// Removes the connection from the registry when the stream goes away.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.disconnect(&self.id) {
            debug!(connection_id = %self.id, "stream dropped, connection released");
        }
    }
}

struct StreamState {
    receiver: mpsc::Receiver<Event>,
    guard: ConnectionGuard,
    poll_interval: Duration,
}

/// Infinite stream of [`Frame`]s for one connection.
///
/// Waits up to the poll interval for the next event and yields
/// [`Frame::KeepAlive`] when none arrives. Every pulled frame counts as a
/// liveness acknowledgement, since the transport is draining it. The stream
/// ends once the connection is removed from the registry and its queue is
/// drained. It cannot be restarted: a second stream for the same connection
/// ends immediately.
pub struct EventStream {
    inner: BoxStream<'static, Frame>,
}

impl EventStream {
    pub(crate) fn new(
        registry: Arc<ConnectionRegistry>,
        id: ConnectionId,
        poll_interval: Duration,
    ) -> Self {
        let Some(receiver) = registry.take_receiver(&id) else {
            debug!(connection_id = %id, "no receiver to stream, connection unknown or already streaming");
            return Self {
                inner: futures::stream::empty().boxed(),
            };
        };
        let state = StreamState {
            receiver,
            guard: ConnectionGuard { registry, id },
            poll_interval,
        };

        let inner = futures::stream::unfold(state, |mut state| async move {
            let next = tokio::time::timeout(state.poll_interval, state.receiver.recv()).await;
            let frame = match next {
                Ok(Some(event)) => Frame::Event(event),
                Ok(None) => return None,
                Err(_) => Frame::KeepAlive,
            };
            state.guard.registry.acknowledge(&state.guard.id);
            Some((frame, state))
        })
        .boxed();

        Self { inner }
    }
}

impl Stream for EventStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
