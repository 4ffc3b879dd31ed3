//! Duplex event channel: STOMP over WebSocket.
//!
//! [`EventChannel::spawn`] starts a background task that connects to the
//! backend's `/active_event` endpoint, subscribes to the update topic and
//! forwards every parsed [`RemoteUpdate`] on an mpsc channel. Outbound
//! snapshots go through the cloneable [`ChannelHandle`]; publishing never
//! waits for the network and no acknowledgement is tracked.
//!
//! When the connection drops the task waits a fixed delay and reconnects.
//! Consumers of the update stream never see reconnect cycles, only
//! updates. Publishing while no session is up fails with
//! [`ChannelError::Disconnected`]. Snapshots still queued when a session
//! drops are discarded instead of being replayed late.
//!
//! A stalled connect attempt is abandoned after the connect timeout. A
//! connected session sends WebSocket pings on an interval and is treated
//! as dropped when nothing arrives from the backend for the idle timeout.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use retriage_core::Event;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::stomp::{decode_frames, Command, Frame};
use crate::updates::{parse_update, RemoteUpdate};

/// WebSocket path of the STOMP endpoint.
pub const STOMP_ENDPOINT: &str = "/active_event";
/// Destination full-event snapshots are published to.
pub const PUBLISH_DESTINATION: &str = "/ws/update";
/// Topic the backend broadcasts event updates on.
pub const UPDATE_TOPIC: &str = "/topic/event_updates";

/// Snapshots that may wait for the socket before publishing is refused.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Limit for the WebSocket upgrade plus the STOMP handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
/// Silence from the backend after which a session counts as dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// How long [`ChannelTask::shutdown`] waits for the task to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for the update channel.
#[derive(Debug, Clone)]
pub struct EventChannel {
    url: String,
    host: String,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    keepalive_interval: Duration,
    idle_timeout: Duration,
}

/// Publishing side of a running channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: mpsc::Sender<String>,
    connected: watch::Receiver<bool>,
}

/// The background task behind a channel.
pub struct ChannelTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Errors from the channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The WebSocket connection could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The broker misbehaved or refused the session.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No session is up right now; the task is (re)connecting.
    #[error("Event channel is not connected; the update was not sent")]
    Disconnected,

    /// Too many snapshots are waiting for the socket.
    #[error("Event channel is backed up; the update was not sent")]
    Backlog,

    /// The channel task has stopped; nothing can be published.
    #[error("Event channel is closed")]
    Closed,

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a connected session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    Dropped,
    /// Nobody is listening for updates any more.
    ReceiverGone,
}

impl ChannelHandle {
    /// Queue a full snapshot for publication on the current session.
    ///
    /// Returns as soon as the snapshot is queued. Fails when no session is
    /// up, when the outbound queue is full, when the snapshot cannot be
    /// serialized or when the channel task is gone.
    pub fn publish(&self, event: &Event) -> Result<(), ChannelError> {
        if self.outbound.is_closed() {
            return Err(ChannelError::Closed);
        }
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        let json = serde_json::to_string(event)?;
        self.outbound.try_send(json).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Backlog,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Wait until a session is up. Fails once the task has exited.
    pub async fn wait_connected(&self) -> Result<(), ChannelError> {
        let mut connected = self.connected.clone();
        connected
            .wait_for(|up| *up)
            .await
            .map(|_| ())
            .map_err(|_| ChannelError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl ChannelTask {
    /// Stop the task and wait briefly for it to send `DISCONNECT`.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.join).await.is_err() {
            tracing::warn!("Event channel did not stop within the grace period");
        }
    }
}

impl EventChannel {
    /// * `ws_base_url`     - e.g. `ws://host:8080`; the STOMP endpoint
    ///   path is appended.
    /// * `reconnect_delay` - fixed wait between connection attempts.
    pub fn new(ws_base_url: &str, reconnect_delay: Duration) -> Self {
        let url = format!("{}{STOMP_ENDPOINT}", ws_base_url.trim_end_matches('/'));
        let host = host_of(&url);
        Self {
            url,
            host,
            reconnect_delay,
            connect_timeout: CONNECT_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    /// Override how long one connect attempt (upgrade and handshake) may take.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the ping interval and the silence that ends a session.
    pub fn with_keepalive(mut self, interval: Duration, idle_timeout: Duration) -> Self {
        self.keepalive_interval = interval;
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection task.
    ///
    /// Returns the publishing handle, the stream of remote updates and the
    /// task itself. The task runs until `cancel` fires or the update
    /// receiver is dropped.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (ChannelHandle, mpsc::UnboundedReceiver<RemoteUpdate>, ChannelTask) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            tracing::info!(url = %self.url, "Starting event channel");
            self.run(outbound_rx, updates_tx, &connected_tx, task_cancel)
                .await;
            connected_tx.send_replace(false);
            tracing::info!("Event channel task exited");
        });

        (
            ChannelHandle {
                outbound: outbound_tx,
                connected: connected_rx,
            },
            updates_rx,
            ChannelTask { cancel, join },
        )
    }

    /// Connect → session → fixed delay → reconnect, until cancelled.
    async fn run(
        &self,
        mut outbound: mpsc::Receiver<String>,
        updates: mpsc::UnboundedSender<RemoteUpdate>,
        connected: &watch::Sender<bool>,
        cancel: CancellationToken,
    ) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::time::timeout(self.connect_timeout, self.connect()) => result,
            };
            let result = result.unwrap_or_else(|_| {
                Err(ChannelError::Connection(format!(
                    "no session with {} within {:?}",
                    self.url, self.connect_timeout
                )))
            });

            match result {
                Ok(ws) => {
                    tracing::info!(url = %self.url, attempt, "Event channel connected");
                    attempt = 0;
                    connected.send_replace(true);
                    let end = self.run_session(ws, &mut outbound, &updates, &cancel).await;
                    connected.send_replace(false);
                    match end {
                        SessionEnd::Cancelled | SessionEnd::ReceiverGone => return,
                        SessionEnd::Dropped => {
                            discard_stale(&mut outbound);
                            tracing::warn!("Event channel dropped, reconnecting");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        url = %self.url,
                        attempt,
                        error = %e,
                        "Event channel connection failed",
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// Open the WebSocket, complete the STOMP handshake and subscribe.
    async fn connect(&self) -> Result<WsStream, ChannelError> {
        let (mut ws, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            ChannelError::Connection(format!("Failed to connect to {}: {e}", self.url))
        })?;

        send_frame(&mut ws, &Frame::connect(&self.host)).await?;

        let connected = await_connected(&mut ws).await?;
        tracing::debug!(
            version = connected.get("version").unwrap_or("?"),
            server = connected.get("server").unwrap_or("?"),
            "STOMP session established",
        );

        let subscription_id = format!("sub-{}", uuid::Uuid::now_v7());
        send_frame(&mut ws, &Frame::subscribe(&subscription_id, UPDATE_TOPIC)).await?;
        tracing::debug!(subscription_id = %subscription_id, topic = UPDATE_TOPIC, "Subscribed");

        Ok(ws)
    }

    /// Drive one connected session until it ends.
    async fn run_session(
        &self,
        ws: WsStream,
        outbound: &mut mpsc::Receiver<String>,
        updates: &mpsc::UnboundedSender<RemoteUpdate>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let mut publishers_alive = true;
        let mut keepalive = tokio::time::interval_at(
            Instant::now() + self.keepalive_interval,
            self.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let goodbye = Message::Text(Frame::disconnect().encode());
                    if let Err(e) = sink.send(goodbye).await {
                        tracing::debug!(error = %e, "DISCONNECT not delivered");
                    }
                    if let Err(e) = sink.close().await {
                        tracing::debug!(error = %e, "WebSocket close failed");
                    }
                    return SessionEnd::Cancelled;
                }
                _ = keepalive.tick() => {
                    let silent = last_inbound.elapsed();
                    if silent >= self.idle_timeout {
                        tracing::warn!(silent_ms = silent.as_millis() as u64, "Backend went silent");
                        return SessionEnd::Dropped;
                    }
                    if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                        tracing::error!(error = %e, "Keepalive ping failed");
                        return SessionEnd::Dropped;
                    }
                }
                json = outbound.recv(), if publishers_alive => {
                    match json {
                        Some(json) => {
                            let frame = Frame::send_json(PUBLISH_DESTINATION, json);
                            if let Err(e) = sink.send(Message::Text(frame.encode())).await {
                                tracing::error!(error = %e, "Failed to publish snapshot");
                                return SessionEnd::Dropped;
                            }
                            tracing::debug!("Snapshot published");
                        }
                        None => {
                            tracing::debug!("All publishers dropped; channel is receive-only now");
                            publishers_alive = false;
                        }
                    }
                }
                msg = stream.next() => {
                    if matches!(msg, Some(Ok(_))) {
                        last_inbound = Instant::now();
                    }
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => text,
                            Err(_) => {
                                tracing::warn!("Ignoring non-UTF-8 binary frame");
                                continue;
                            }
                        },
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Backend closed the event channel");
                            return SessionEnd::Dropped;
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Event channel receive error");
                            return SessionEnd::Dropped;
                        }
                        None => {
                            tracing::info!("Event channel stream exhausted");
                            return SessionEnd::Dropped;
                        }
                    };
                    if let Some(end) = handle_text(&text, updates) {
                        return end;
                    }
                }
            }
        }
    }
}

/// Dispatch every frame in one inbound text message. Returns `Some` when
/// the session must end.
fn handle_text(text: &str, updates: &mpsc::UnboundedSender<RemoteUpdate>) -> Option<SessionEnd> {
    let frames = match decode_frames(text) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "Undecodable STOMP message");
            return None;
        }
    };

    for frame in frames {
        match frame.command {
            Command::Message => match parse_update(&frame.body) {
                Ok(update) => {
                    if updates.send(update).is_err() {
                        tracing::info!("Update receiver dropped, stopping channel");
                        return Some(SessionEnd::ReceiverGone);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, body = %frame.body, "Unparseable event update");
                }
            },
            Command::Error => {
                tracing::error!(
                    message = frame.get("message").unwrap_or(""),
                    details = %frame.body,
                    "Broker reported error",
                );
                return Some(SessionEnd::Dropped);
            }
            other => {
                tracing::debug!(command = %other, "Ignoring STOMP frame");
            }
        }
    }
    None
}

async fn await_connected(ws: &mut WsStream) -> Result<Frame, ChannelError> {
    while let Some(msg) = ws.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                return Err(ChannelError::Protocol(format!(
                    "closed during handshake: {frame:?}"
                )))
            }
            Ok(_) => continue,
            Err(e) => return Err(ChannelError::Connection(e.to_string())),
        };
        let frames =
            decode_frames(&text).map_err(|e| ChannelError::Protocol(e.to_string()))?;
        for frame in frames {
            match frame.command {
                Command::Connected => return Ok(frame),
                Command::Error => {
                    return Err(ChannelError::Protocol(
                        frame.get("message").unwrap_or("broker refused CONNECT").to_string(),
                    ))
                }
                other => {
                    tracing::debug!(command = %other, "Unexpected frame before CONNECTED");
                }
            }
        }
    }
    Err(ChannelError::Protocol("stream ended during handshake".into()))
}

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> Result<(), ChannelError> {
    ws.send(Message::Text(frame.encode()))
        .await
        .map_err(|e| ChannelError::Connection(e.to_string()))
}

/// Drop snapshots that were still queued when a session went down.
fn discard_stale(outbound: &mut mpsc::Receiver<String>) {
    let mut dropped = 0usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Discarded snapshots queued before the connection dropped");
    }
}

/// `host[:port]` part of a WebSocket URL, for the STOMP `host` header.
fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}
