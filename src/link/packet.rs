//! Socket.IO v4 packet codec (Engine.IO v4, websocket transport).
//!
//! Every websocket text frame is one Engine.IO packet: a single type digit
//! followed by an optional payload. Engine.IO `message` packets carry a
//! Socket.IO packet, itself a type digit, an optional `/namespace,` prefix,
//! an optional ack id, and a JSON payload.
//!
//! Only the default namespace is used; packets addressed elsewhere decode to
//! [`SocketPacket::Other`]. Binary attachments are not supported.

use serde::Deserialize;
use serde_json::Value;

use crate::{AppError, Result};

/// Engine.IO `pong`, the reply to a server `ping`.
pub const PONG: &str = "3";

/// Engine.IO `open` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine.IO session id.
    pub sid: String,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
}

/// Decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// `0`: transport opened.
    Open(OpenHandshake),
    /// `1`: transport closing.
    Close,
    /// `2`: heartbeat from the server.
    Ping,
    /// `3`: heartbeat reply.
    Pong,
    /// `4`: Socket.IO payload.
    Message(SocketPacket),
    /// `5`/`6`: upgrade and noop, irrelevant on a websocket-only transport.
    Noop,
}

/// Decoded Socket.IO packet in the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// `0`: namespace connected; carries `{"sid": …}`.
    Connect(Option<Value>),
    /// `1`: namespace disconnected by the server.
    Disconnect,
    /// `2`: event `[name, args…]`.
    Event {
        /// Event name.
        name: String,
        /// Event arguments.
        args: Vec<Value>,
    },
    /// `4`: namespace connection refused (e.g. bad token).
    ConnectError(Value),
    /// Acks, binary packets, and other namespaces.
    Other,
}

impl EnginePacket {
    /// Decode one websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Link`] for an empty frame, an unknown packet type,
    /// or a malformed JSON payload.
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| AppError::Link("empty engine.io packet".into()))?;
        let payload = chars.as_str();

        match kind {
            '0' => serde_json::from_str(payload)
                .map(Self::Open)
                .map_err(|e| AppError::Link(format!("malformed open packet: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => SocketPacket::decode(payload).map(Self::Message),
            '5' | '6' => Ok(Self::Noop),
            other => Err(AppError::Link(format!(
                "unknown engine.io packet type {other:?}"
            ))),
        }
    }
}

impl SocketPacket {
    /// Decode the Socket.IO packet carried by an Engine.IO `message`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Link`] for an empty packet or malformed JSON.
    pub fn decode(packet: &str) -> Result<Self> {
        let mut chars = packet.chars();
        let kind = chars
            .next()
            .ok_or_else(|| AppError::Link("empty socket.io packet".into()))?;
        let mut rest = chars.as_str();

        if let Some(stripped) = rest.strip_prefix('/') {
            let (namespace, tail) = stripped.split_once(',').unwrap_or((stripped, ""));
            if !namespace.is_empty() {
                return Ok(Self::Other);
            }
            rest = tail;
        }

        // Ack id: digits before the JSON payload.
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        let json = || -> Result<Value> {
            serde_json::from_str(rest)
                .map_err(|e| AppError::Link(format!("malformed socket.io payload: {e}")))
        };

        match kind {
            '0' if rest.is_empty() => Ok(Self::Connect(None)),
            '0' => json().map(|v| Self::Connect(Some(v))),
            '1' => Ok(Self::Disconnect),
            '2' => match json()? {
                Value::Array(mut items) if !items.is_empty() => match items.remove(0) {
                    Value::String(name) => Ok(Self::Event { name, args: items }),
                    _ => Err(AppError::Link("event name is not a string".into())),
                },
                _ => Err(AppError::Link("event payload is not a non-empty array".into())),
            },
            '4' if rest.is_empty() => Ok(Self::ConnectError(Value::Null)),
            '4' => json().map(Self::ConnectError),
            _ => Ok(Self::Other),
        }
    }
}

/// Socket.IO `CONNECT` to the default namespace with an auth payload.
#[must_use]
pub fn encode_connect(auth: &Value) -> String {
    format!("40{auth}")
}

/// Socket.IO `DISCONNECT` from the default namespace.
#[must_use]
pub fn encode_disconnect() -> String {
    "41".to_owned()
}

/// Socket.IO `EVENT` with a single argument.
#[must_use]
pub fn encode_event(name: &str, payload: &Value) -> String {
    let frame = Value::Array(vec![Value::String(name.to_owned()), payload.clone()]);
    format!("42{frame}")
}

/// Human-readable message of a `CONNECT_ERROR` payload.
#[must_use]
pub fn connect_error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| payload.to_string(), ToOwned::to_owned)
}
