//! WebSocket event endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use crewstream_realtime::{ClientMessage, ServerControl, Transport};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::state::AppState;

/// Upgrade to a WebSocket carrying the caller's events.
///
/// Each event is one text frame with the envelope JSON. A client
/// `{"type": "ping"}` is answered with `{"type": "pong"}`.
#[utoipa::path(
    get,
    path = "/events/ws",
    tag = "Events",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 401, description = "Missing user id", body = super::ErrorResponse)
    )
)]
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: AuthUser) {
    let broadcaster = state.hub.broadcaster();
    let id = broadcaster.connect(user.id(), Transport::WebSocket);
    info!(connection_id = %id, user_id = %user.id(), "WebSocket client connected");

    let mut frames = broadcaster.stream(id);
    let (mut sender, mut receiver) = socket.split();
    let (control_tx, mut control_rx) = mpsc::channel::<String>(8);

    // Events and control replies share the one sink.
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                frame = frames.next() => match frame {
                    Some(frame) => match frame.to_ws_text() {
                        Some(text) => text,
                        None => continue,
                    },
                    None => break,
                },
                Some(reply) = control_rx.recv() => reply,
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let registry = state.hub.registry().clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Ping) => {
                        registry.acknowledge(&id);
                        if control_tx.send(ServerControl::Pong.to_json()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(connection_id = %id, error = %e, "ignoring client message"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever side finishes first takes the other down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    state.hub.registry().disconnect(&id);
    info!(connection_id = %id, "WebSocket client disconnected");
}
