//! Websocket session with the analysis server.
//!
//! [`RemoteLink`] keeps one Socket.IO connection alive for the life of the
//! process:
//! 1. Connect the websocket to `<server>/socket.io/?EIO=4&transport=websocket`.
//! 2. On the Engine.IO `open` packet, join the default namespace with the
//!    connector credentials.
//! 3. Relay inbound events as [`LinkEvent`]s, answer pings, and write queued
//!    [`AnalysisUpdate`]s.
//! 4. On any failure or disconnect, wait [`RECONNECT_DELAY`] and start over.
//!    There is no attempt limit.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::link::packet::{
    connect_error_message, encode_connect, encode_disconnect, encode_event, EnginePacket,
    SocketPacket, PONG,
};
use crate::link::{
    AnalysisRequest, AnalysisUpdate, LinkEvent, ANALYSIS_UPDATE, REQUEST_ANALYSIS, STOP_ANALYSIS,
};
use crate::{AppError, Result};

/// Delay between a connection failure and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long the server gets to send its Engine.IO `open` packet.
const OPEN_TIMEOUT: Duration = Duration::from_secs(20);

/// How a single websocket session ended without an error.
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    Closed(String),
}

/// Reconnecting Socket.IO client.
#[derive(Debug, Clone)]
pub struct RemoteLink {
    config: ConnectionConfig,
    reconnect_delay: Duration,
}

impl RemoteLink {
    /// Create a link with the default [`RECONNECT_DELAY`].
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    /// Override the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Run the link in a background task until `cancel` fires.
    #[must_use]
    pub fn spawn(
        self,
        event_tx: mpsc::Sender<LinkEvent>,
        update_rx: mpsc::Receiver<AnalysisUpdate>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(event_tx, update_rx, cancel))
    }

    /// Connect, serve, and reconnect until `cancel` fires or `event_tx`
    /// closes.
    pub async fn run(
        self,
        event_tx: mpsc::Sender<LinkEvent>,
        mut update_rx: mpsc::Receiver<AnalysisUpdate>,
        cancel: CancellationToken,
    ) {
        let url = match socket_io_url(&self.config.server_url) {
            Ok(url) => url,
            Err(err) => {
                error!(%err, "invalid server url, remote link disabled");
                return;
            }
        };

        loop {
            info!(server = %self.config.server_url, "connecting to server");

            let mut connected = false;
            let reason = match self
                .session(&url, &event_tx, &mut update_rx, &cancel, &mut connected)
                .await
            {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Closed(reason)) => {
                    warn!(%reason, "disconnected from server");
                    reason
                }
                Err(err) => {
                    error!(%err, "connection error");
                    err.to_string()
                }
            };

            // Only a session that reported `Connected` has anything to undo.
            if connected
                && event_tx
                    .send(LinkEvent::Disconnected { reason })
                    .await
                    .is_err()
            {
                break;
            }

            info!(delay = ?self.reconnect_delay, "reconnecting after delay");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        debug!("remote link stopped");
    }

    async fn session(
        &self,
        url: &str,
        event_tx: &mpsc::Sender<LinkEvent>,
        update_rx: &mut mpsc::Receiver<AnalysisUpdate>,
        cancel: &CancellationToken,
        connected: &mut bool,
    ) -> Result<SessionEnd> {
        let (ws, _response) = tokio::select! {
            () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            result = connect_async(url) => result?,
        };
        let (mut sink, mut stream) = ws.split();

        // Updates produced while offline describe positions nobody is watching.
        while update_rx.try_recv().is_ok() {}

        let auth = json!({ "type": "connector", "token": self.config.token });
        let mut deadline = Instant::now() + OPEN_TIMEOUT;
        let mut heartbeat: Option<Duration> = None;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    if *connected {
                        let _ = sink.send(Message::Text(encode_disconnect())).await;
                    }
                    let _ = sink.close().await;
                    return Ok(SessionEnd::Cancelled);
                }

                () = tokio::time::sleep_until(deadline) => {
                    return Ok(SessionEnd::Closed("heartbeat timeout".into()));
                }

                frame = stream.next() => {
                    let text = match frame {
                        None => return Ok(SessionEnd::Closed("stream closed".into())),
                        Some(Err(err)) => return Err(err.into()),
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map_or_else(
                                || "closed by server".to_owned(),
                                |f| format!("closed by server: {}", f.reason),
                            );
                            return Ok(SessionEnd::Closed(reason));
                        }
                        Some(Ok(_)) => continue,
                    };

                    let packet = match EnginePacket::decode(&text) {
                        Ok(packet) => packet,
                        Err(err) => {
                            warn!(%err, raw = %text, "ignoring malformed packet");
                            continue;
                        }
                    };

                    match packet {
                        EnginePacket::Open(open) => {
                            let window = Duration::from_millis(open.ping_interval + open.ping_timeout);
                            heartbeat = Some(window);
                            deadline = Instant::now() + window;
                            debug!(sid = %open.sid, ?window, "engine.io transport open");
                            sink.send(Message::Text(encode_connect(&auth))).await?;
                        }
                        EnginePacket::Ping => {
                            if let Some(window) = heartbeat {
                                deadline = Instant::now() + window;
                            }
                            sink.send(Message::Text(PONG.to_owned())).await?;
                        }
                        EnginePacket::Pong | EnginePacket::Noop => {}
                        EnginePacket::Close => {
                            return Ok(SessionEnd::Closed("server closed transport".into()));
                        }
                        EnginePacket::Message(SocketPacket::Connect(payload)) => {
                            *connected = true;
                            let sid = payload
                                .as_ref()
                                .and_then(|p| p.get("sid"))
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_owned();
                            info!(%sid, "connected to server");
                            if event_tx.send(LinkEvent::Connected).await.is_err() {
                                return Ok(SessionEnd::Cancelled);
                            }
                        }
                        EnginePacket::Message(SocketPacket::ConnectError(payload)) => {
                            return Err(AppError::Link(format!(
                                "connection refused: {}",
                                connect_error_message(&payload)
                            )));
                        }
                        EnginePacket::Message(SocketPacket::Disconnect) => {
                            return Ok(SessionEnd::Closed("server disconnected namespace".into()));
                        }
                        EnginePacket::Message(SocketPacket::Event { name, args }) => {
                            if let Some(event) = decode_event(&name, args) {
                                if event_tx.send(event).await.is_err() {
                                    return Ok(SessionEnd::Cancelled);
                                }
                            }
                        }
                        EnginePacket::Message(SocketPacket::Other) => {}
                    }
                }

                Some(update) = update_rx.recv() => {
                    if !*connected {
                        debug!("not connected, dropping analysis update");
                        continue;
                    }
                    let payload = serde_json::to_value(&update)
                        .map_err(|e| AppError::Link(format!("failed to serialise update: {e}")))?;
                    sink.send(Message::Text(encode_event(ANALYSIS_UPDATE, &payload))).await?;
                }
            }
        }
    }
}

/// Map an inbound Socket.IO event to a [`LinkEvent`].
///
/// Unknown events and malformed payloads yield `None`.
#[must_use]
pub fn decode_event(name: &str, args: Vec<Value>) -> Option<LinkEvent> {
    match name {
        REQUEST_ANALYSIS => {
            let Some(payload) = args.into_iter().next() else {
                warn!("request_analysis without payload, ignoring");
                return None;
            };
            match serde_json::from_value::<AnalysisRequest>(payload) {
                Ok(request) => Some(LinkEvent::RequestAnalysis(request)),
                Err(err) => {
                    warn!(%err, "malformed request_analysis payload, ignoring");
                    None
                }
            }
        }
        STOP_ANALYSIS => Some(LinkEvent::StopAnalysis),
        other => {
            debug!(event = other, "ignoring unknown server event");
            None
        }
    }
}

/// Websocket endpoint for a server base URL.
///
/// `https://` maps to `wss://` and `http://` to `ws://`; a URL without a
/// scheme is treated as `wss://`.
///
/// # Errors
///
/// Returns `AppError::Config` for an empty host or an unsupported scheme.
pub fn socket_io_url(server_url: &str) -> Result<String> {
    let trimmed = server_url.trim();
    let (scheme, rest) = match trimmed.split_once("://") {
        Some(("https" | "wss", rest)) => ("wss", rest),
        Some(("http" | "ws", rest)) => ("ws", rest),
        Some((other, _)) => {
            return Err(AppError::Config(format!(
                "unsupported server url scheme: {other}"
            )))
        }
        None => ("wss", trimmed),
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(AppError::Config("server url has no host".into()));
    }

    Ok(format!("{scheme}://{rest}/socket.io/?EIO=4&transport=websocket"))
}
