//! WebSocket endpoint tests against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crewstream_core::{Config, Graph};
use crewstream_executor::{Crew, CrewEngine, CrewError, MemoryDatabase};
use crewstream_realtime::Event;
use crewstream_server::{build_router, startup, AppState};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct NoCrew;

impl CrewEngine for NoCrew {
    fn translate(&self, graph: &Graph) -> Result<Box<dyn Crew>, CrewError> {
        Err(CrewError::Translation(format!("no crews for {}", graph.id)))
    }
}

async fn serve() -> (Arc<AppState>, SocketAddr) {
    let mut config = Config::for_profile("CSTEST_SERVER_WS");
    // Keep keepalive frames out of the way; acks then come only from pings.
    config.realtime.poll_interval_ms = 60_000;
    config.queue.names = vec!["executions".into(), "maintenance".into()];
    let state = startup::assemble(config, Arc::new(MemoryDatabase::new()), Arc::new(NoCrew));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, addr)
}

async fn open(addr: SocketAddr, user: Option<&str>) -> Result<Client, WsError> {
    let mut request = format!("ws://{addr}/events/ws").into_client_request().unwrap();
    if let Some(user) = user {
        request.headers_mut().insert("x-user-id", user.parse().unwrap());
    }
    connect_async(request).await.map(|(client, _)| client)
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("message before timeout")
            .expect("stream still open")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !done() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn upgrade_requires_user_header() {
    let (state, addr) = serve().await;
    match open(addr, None).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade accepted without X-User-Id"),
    }
    assert!(state.hub.registry().is_empty());
}

#[tokio::test]
async fn ping_is_answered_with_pong_and_counts_as_ack() {
    let (state, addr) = serve().await;
    let mut client = open(addr, Some("alice")).await.unwrap();

    let greeting = next_json(&mut client).await;
    assert_eq!(greeting["event"], "connection");
    assert_eq!(greeting["data"]["status"], "connected");

    let registry = state.hub.registry().clone();
    let ids = registry.all_connections();
    assert_eq!(ids.len(), 1);
    let id = ids[0];
    assert_eq!(registry.owner(&id).as_deref(), Some("alice"));
    assert_eq!(state.hub.stats().websocket_connections, 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(registry.stale_connections(Duration::from_millis(100)).contains(&id));

    client
        .send(Message::text(json!({"type": "ping"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await, json!({"type": "pong"}));
    assert!(!registry.stale_connections(Duration::from_millis(100)).contains(&id));

    // Anything else from the client is ignored and the socket stays up.
    client
        .send(Message::text(r#"{"type":"subscribe"}"#))
        .await
        .unwrap();
    client
        .send(Message::text(json!({"type": "ping"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn user_events_arrive_as_envelope_text() {
    let (state, addr) = serve().await;
    let mut alice = open(addr, Some("alice")).await.unwrap();
    let mut bob = open(addr, Some("bob")).await.unwrap();
    next_json(&mut alice).await;
    next_json(&mut bob).await;

    let delivered = state
        .hub
        .broadcaster()
        .broadcast_to_user("alice", &Event::heartbeat());
    assert_eq!(delivered, 1);

    let event = next_json(&mut alice).await;
    assert_eq!(event["event"], "heartbeat");
    assert!(event["timestamp"].is_string());
    assert_eq!(event["data"]["message"], "heartbeat");

    // Bob only ever sees his pong.
    bob.send(Message::text(json!({"type": "ping"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut bob).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn client_close_removes_connection() {
    let (state, addr) = serve().await;
    let mut client = open(addr, Some("alice")).await.unwrap();
    next_json(&mut client).await;
    assert_eq!(state.hub.registry().len(), 1);

    client.close(None).await.unwrap();
    let registry = state.hub.registry().clone();
    wait_until(|| registry.is_empty()).await;
    assert!(registry.connections_for_user("alice").is_empty());
}
