//! Integration tests for `EventChannel` against an in-process STOMP broker.
//!
//! The broker is a bare `tokio-tungstenite` server that speaks just enough
//! STOMP to complete the handshake, accept a subscription, push `MESSAGE`
//! frames and capture `SEND` frames.

use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use retriage_client::channel::{PUBLISH_DESTINATION, UPDATE_TOPIC};
use retriage_client::stomp::{decode_frames, Command, Frame};
use retriage_client::{ChannelError, ChannelHandle, EventChannel, RemoteUpdate};
use retriage_core::{Event, Status};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

const STEP: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Broker helpers
// ---------------------------------------------------------------------------

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}"))
}

async fn read_frame(ws: &mut WebSocketStream<TcpStream>) -> Frame {
    loop {
        let msg = tokio::time::timeout(STEP, ws.next())
            .await
            .expect("client went quiet")
            .expect("client closed the socket")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            let mut frames = decode_frames(&text).expect("client sent a bad frame");
            if let Some(frame) = frames.pop() {
                return frame;
            }
        }
    }
}

/// Accept one client and complete CONNECT/SUBSCRIBE. Returns the socket
/// and the subscription id.
async fn accept_session(listener: &TcpListener) -> (WebSocketStream<TcpStream>, String) {
    let (stream, _) = tokio::time::timeout(STEP, listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    let connect = read_frame(&mut ws).await;
    assert_eq!(connect.command, Command::Connect);
    assert_eq!(connect.get("accept-version"), Some("1.2"));

    let connected = Frame::new(Command::Connected).header("version", "1.2");
    ws.send(Message::Text(connected.encode())).await.unwrap();

    let subscribe = read_frame(&mut ws).await;
    assert_eq!(subscribe.command, Command::Subscribe);
    assert_eq!(subscribe.get("destination"), Some(UPDATE_TOPIC));
    let id = subscribe.get("id").unwrap().to_string();

    (ws, id)
}

async fn push(ws: &mut WebSocketStream<TcpStream>, subscription: &str, body: &str) {
    let frame = Frame::new(Command::Message)
        .header("destination", UPDATE_TOPIC)
        .header("subscription", subscription)
        .header("message-id", "1")
        .body("application/json", body);
    ws.send(Message::Text(frame.encode())).await.unwrap();
}

fn snapshot_body(name: &str) -> String {
    let event = Event::new(name, 60_000)
        .with_id(7)
        .with_status(Status::Running);
    format!(
        r#"{{"httpStatus":200,"error":"Nominal Event Update","data":{}}}"#,
        serde_json::to_string(&event).unwrap()
    )
}

async fn connected(handle: &ChannelHandle) {
    tokio::time::timeout(STEP, handle.wait_connected())
        .await
        .expect("session never came up")
        .unwrap();
}

async fn disconnected(handle: &ChannelHandle) {
    tokio::time::timeout(STEP, async {
        while handle.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session never went down");
}

async fn next_update(rx: &mut tokio::sync::mpsc::UnboundedReceiver<RemoteUpdate>) -> RemoteUpdate {
    tokio::time::timeout(STEP, rx.recv())
        .await
        .expect("no update arrived")
        .expect("channel closed")
}

// ---------------------------------------------------------------------------
// Test: broadcasts reach the update stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcasts_are_forwarded_as_updates() {
    let (listener, base) = bind().await;
    let cancel = CancellationToken::new();
    let (_handle, mut updates, task) =
        EventChannel::new(&base, Duration::from_millis(50)).spawn(cancel);

    let (mut ws, sub) = accept_session(&listener).await;
    push(&mut ws, &sub, &snapshot_body("Drill")).await;
    push(&mut ws, &sub, r#"{"httpStatus":404,"data":null}"#).await;

    match next_update(&mut updates).await {
        RemoteUpdate::Snapshot(event) => {
            assert_eq!(event.name, "Drill");
            assert_eq!(event.status, Status::Running);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    assert_eq!(next_update(&mut updates).await, RemoteUpdate::NoActiveEvent);

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: publish sends a SEND frame with the full snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_sends_full_snapshot() {
    let (listener, base) = bind().await;
    let (handle, _updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .spawn(CancellationToken::new());

    let (mut ws, _sub) = accept_session(&listener).await;
    connected(&handle).await;

    let event = Event::new("Drill", 60_000)
        .with_id(7)
        .with_status(Status::Paused);
    handle.publish(&event).unwrap();

    let send = read_frame(&mut ws).await;
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.get("destination"), Some(PUBLISH_DESTINATION));
    let published: Event = serde_json::from_str(&send.body).unwrap();
    assert_eq!(published, event);

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: publishing before the first handshake is refused, not swallowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_before_first_session_is_refused() {
    let (listener, base) = bind().await;
    let (handle, _updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .spawn(CancellationToken::new());

    let early = Event::new("Too early", 60_000).with_id(7);
    assert_matches!(handle.publish(&early), Err(ChannelError::Disconnected));

    let (mut ws, _sub) = accept_session(&listener).await;
    connected(&handle).await;

    let event = Event::new("On time", 60_000).with_id(7);
    handle.publish(&event).unwrap();

    let send = read_frame(&mut ws).await;
    assert_eq!(send.command, Command::Send);
    let published: Event = serde_json::from_str(&send.body).unwrap();
    assert_eq!(published.name, "On time");

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: publishing while reconnecting is refused
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_during_reconnect_is_refused() {
    let (listener, base) = bind().await;
    let (handle, _updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .spawn(CancellationToken::new());

    let (ws, _sub) = accept_session(&listener).await;
    connected(&handle).await;
    drop(ws);
    disconnected(&handle).await;

    let lost = Event::new("While away", 60_000).with_id(7);
    assert_matches!(handle.publish(&lost), Err(ChannelError::Disconnected));

    let (mut ws, _sub) = accept_session(&listener).await;
    connected(&handle).await;
    handle.publish(&Event::new("Back", 60_000).with_id(7)).unwrap();

    let send = read_frame(&mut ws).await;
    let published: Event = serde_json::from_str(&send.body).unwrap();
    assert_eq!(published.name, "Back");

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a WebSocket upgrade that never completes is retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stalled_upgrade_is_retried() {
    let (listener, base) = bind().await;
    let (handle, _updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .with_connect_timeout(Duration::from_millis(200))
        .spawn(CancellationToken::new());

    // Accept the TCP connection but never answer the upgrade request.
    let (_stalled, _) = tokio::time::timeout(STEP, listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    assert!(!handle.is_connected());

    let (_ws, _sub) = accept_session(&listener).await;
    connected(&handle).await;

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a backend that stops answering is treated as a dropped session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_backend_triggers_reconnect() {
    let (listener, base) = bind().await;
    let (handle, _updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .with_keepalive(Duration::from_millis(100), Duration::from_millis(300))
        .spawn(CancellationToken::new());

    // Hold the socket without reading, so pings are never answered.
    let (_half_open, _sub) = accept_session(&listener).await;
    connected(&handle).await;

    let (_ws, _sub) = accept_session(&listener).await;
    connected(&handle).await;

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a dropped connection is re-established after the fixed delay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnects_after_connection_drop() {
    let (listener, base) = bind().await;
    let (_handle, mut updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .spawn(CancellationToken::new());

    let (ws, _sub) = accept_session(&listener).await;
    drop(ws);

    let (mut ws, sub) = accept_session(&listener).await;
    push(&mut ws, &sub, &snapshot_body("After reconnect")).await;

    match next_update(&mut updates).await {
        RemoteUpdate::Snapshot(event) => assert_eq!(event.name, "After reconnect"),
        other => panic!("expected snapshot, got {other:?}"),
    }

    task.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: shutdown sends DISCONNECT
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_sends_disconnect() {
    let (listener, base) = bind().await;
    let (handle, _updates, task) = EventChannel::new(&base, Duration::from_millis(50))
        .spawn(CancellationToken::new());

    let (mut ws, _sub) = accept_session(&listener).await;
    task.shutdown().await;

    let frame = read_frame(&mut ws).await;
    assert_eq!(frame.command, Command::Disconnect);
    assert!(handle.is_closed());
}
