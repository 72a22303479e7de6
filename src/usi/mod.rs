//! USI engine adapter.
//!
//! Everything between the connector loop and the engine subprocess:
//! - `codec`: newline framing and the carry-over [`LineAssembler`](codec::LineAssembler).
//! - `protocol`: outbound commands and inbound line classification.
//! - `throttle`: at-most-one-per-window sampling of evaluation lines.
//! - `machine`: handshake / analysis state machine.
//! - `spawner`: process spawning and exit monitoring.
//! - `reader` / `writer`: stdio tasks.
//! - `supervisor`: owner of the single live engine session.

pub mod codec;
pub mod machine;
pub mod protocol;
pub mod reader;
pub mod spawner;
pub mod supervisor;
pub mod throttle;
pub mod writer;
