//! Remote link to the analysis server.
//!
//! The server speaks Socket.IO. Only three events cross the link:
//!
//! | Direction | Event                        | Payload             |
//! |-----------|------------------------------|---------------------|
//! | inbound   | `request_analysis`           | `{ "sfen": "…" }`   |
//! | inbound   | `stop_analysis`              | none                |
//! | outbound  | `connector_analysis_update`  | `{ "info": "…" }`   |
//!
//! - `packet`: Engine.IO / Socket.IO framing.
//! - `client`: websocket session with authentication and fixed-delay
//!   reconnects.

pub mod client;
pub mod packet;

use serde::{Deserialize, Serialize};

/// Inbound event: analyse a position.
pub const REQUEST_ANALYSIS: &str = "request_analysis";
/// Inbound event: stop analysing.
pub const STOP_ANALYSIS: &str = "stop_analysis";
/// Outbound event: one throttled evaluation line.
pub const ANALYSIS_UPDATE: &str = "connector_analysis_update";

/// Payload of `request_analysis`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisRequest {
    /// Position descriptor. Missing descriptors decode as empty and are
    /// dropped by the engine state machine.
    #[serde(default)]
    pub sfen: String,
}

/// Payload of `connector_analysis_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisUpdate {
    /// Raw evaluation line.
    pub info: String,
}

/// Events the link delivers to the connector loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The namespace connection was accepted.
    Connected,
    /// A connection that had reported [`LinkEvent::Connected`] ended, cleanly
    /// or with an error. A reconnect is scheduled.
    Disconnected {
        /// Why the connection ended.
        reason: String,
    },
    /// Inbound `request_analysis`.
    RequestAnalysis(AnalysisRequest),
    /// Inbound `stop_analysis`.
    StopAnalysis,
}
