//! Unit tests for Engine.IO / Socket.IO framing.

use serde_json::{json, Value};

use shogistack_connector::link::packet::{
    connect_error_message, encode_connect, encode_disconnect, encode_event, EnginePacket,
    OpenHandshake, SocketPacket, PONG,
};
use shogistack_connector::AppError;

// ── Engine.IO ────────────────────────────────────────────────────────────────

/// The `open` packet carries the heartbeat parameters.
#[test]
fn open_packet_is_decoded() {
    let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    let packet = EnginePacket::decode(frame).expect("valid open packet");

    assert_eq!(
        packet,
        EnginePacket::Open(OpenHandshake {
            sid: "abc".into(),
            ping_interval: 25_000,
            ping_timeout: 20_000,
        })
    );
}

/// Control packets without payload.
#[test]
fn control_packets_are_decoded() {
    assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
    assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping);
    assert_eq!(EnginePacket::decode(PONG).unwrap(), EnginePacket::Pong);
    assert_eq!(EnginePacket::decode("5").unwrap(), EnginePacket::Noop);
    assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
}

/// Empty frames, unknown types, and broken JSON are link errors.
#[test]
fn malformed_frames_are_rejected() {
    for frame in ["", "9", "0not json", "42not json", "42{}", "42[1]"] {
        let err = EnginePacket::decode(frame).expect_err(frame);
        assert!(matches!(err, AppError::Link(_)), "frame {frame:?}: {err}");
    }
}

// ── Socket.IO ────────────────────────────────────────────────────────────────

/// Namespace connect, with and without the session payload.
#[test]
fn connect_packets_are_decoded() {
    assert_eq!(
        EnginePacket::decode(r#"40{"sid":"xyz"}"#).unwrap(),
        EnginePacket::Message(SocketPacket::Connect(Some(json!({ "sid": "xyz" }))))
    );
    assert_eq!(
        EnginePacket::decode("40").unwrap(),
        EnginePacket::Message(SocketPacket::Connect(None))
    );
}

/// Server-side namespace disconnect.
#[test]
fn disconnect_packet_is_decoded() {
    assert_eq!(
        EnginePacket::decode("41").unwrap(),
        EnginePacket::Message(SocketPacket::Disconnect)
    );
}

/// Events split into name and arguments.
#[test]
fn event_packets_are_decoded() {
    let packet = SocketPacket::decode(r#"2["request_analysis",{"sfen":"X"}]"#).unwrap();

    assert_eq!(
        packet,
        SocketPacket::Event {
            name: "request_analysis".into(),
            args: vec![json!({ "sfen": "X" })],
        }
    );
}

/// An ack id between the type and the payload is skipped.
#[test]
fn event_with_ack_id_is_decoded() {
    let packet = SocketPacket::decode(r#"212["stop_analysis"]"#).unwrap();

    assert_eq!(
        packet,
        SocketPacket::Event {
            name: "stop_analysis".into(),
            args: Vec::new(),
        }
    );
}

/// Packets for other namespaces are ignored.
#[test]
fn other_namespace_is_ignored() {
    assert_eq!(
        SocketPacket::decode(r#"2/admin,["request_analysis",{"sfen":"X"}]"#).unwrap(),
        SocketPacket::Other
    );
}

/// Acks and binary packets are not used.
#[test]
fn unsupported_packet_types_are_other() {
    assert_eq!(SocketPacket::decode("3[]").unwrap(), SocketPacket::Other);
    assert_eq!(SocketPacket::decode("51-[]").unwrap(), SocketPacket::Other);
}

/// A refused connection exposes the server message.
#[test]
fn connect_error_is_decoded() {
    let packet = SocketPacket::decode(r#"4{"message":"invalid token"}"#).unwrap();

    let SocketPacket::ConnectError(payload) = packet else {
        panic!("expected connect error, got {packet:?}");
    };
    assert_eq!(connect_error_message(&payload), "invalid token");
    assert_eq!(connect_error_message(&json!({ "code": 1 })), r#"{"code":1}"#);
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// The namespace connect carries the auth object.
#[test]
fn connect_is_encoded_with_auth() {
    let frame = encode_connect(&json!({ "type": "connector", "token": "T" }));

    let payload = frame.strip_prefix("40").expect("connect prefix");
    let auth: Value = serde_json::from_str(payload).unwrap();
    assert_eq!(auth, json!({ "type": "connector", "token": "T" }));
}

/// Disconnect and event frames.
#[test]
fn disconnect_and_event_are_encoded() {
    assert_eq!(encode_disconnect(), "41");
    assert_eq!(
        encode_event("connector_analysis_update", &json!({ "info": "info score cp 1" })),
        r#"42["connector_analysis_update",{"info":"info score cp 1"}]"#
    );
}
