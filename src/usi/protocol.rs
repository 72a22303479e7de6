//! USI wire vocabulary.
//!
//! Outbound [`Command`]s render to exactly one protocol line each; inbound
//! lines are classified by [`EngineLine::parse`]. Only the handful of lines
//! the connector reacts to are recognised; everything else is
//! [`EngineLine::Other`] and ignored by the caller.
//!
//! | Engine line                  | Maps to                    |
//! |------------------------------|----------------------------|
//! | `usiok`                      | [`EngineLine::UsiOk`]      |
//! | `readyok`                    | [`EngineLine::ReadyOk`]    |
//! | `id name …` / `id author …`  | [`EngineLine::Id`]         |
//! | `info … score …`             | [`EngineLine::Info`]       |
//! | *(any other)*                | [`EngineLine::Other`]      |

use std::fmt::{Display, Formatter};

/// A command written to the engine's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `usi`: handshake identify.
    Usi,
    /// `setoption name <name> value <value>`.
    SetOption {
        /// Option name.
        name: String,
        /// Option value as sent on the wire.
        value: String,
    },
    /// `isready`: readiness probe.
    IsReady,
    /// `usinewgame`.
    UsiNewGame,
    /// `stop`: cancel the running search; harmless when idle.
    Stop,
    /// `position sfen <sfen>`.
    Position {
        /// Position descriptor.
        sfen: String,
    },
    /// `go infinite`: search until stopped.
    GoInfinite,
    /// `quit`.
    Quit,
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usi => f.write_str("usi"),
            Self::SetOption { name, value } => write!(f, "setoption name {name} value {value}"),
            Self::IsReady => f.write_str("isready"),
            Self::UsiNewGame => f.write_str("usinewgame"),
            Self::Stop => f.write_str("stop"),
            Self::Position { sfen } => write!(f, "position sfen {sfen}"),
            Self::GoInfinite => f.write_str("go infinite"),
            Self::Quit => f.write_str("quit"),
        }
    }
}

/// Which `id` field the engine reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    /// `id name`.
    Name,
    /// `id author`.
    Author,
}

/// Classification of one line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    /// Handshake acknowledgement.
    UsiOk,
    /// Readiness acknowledgement.
    ReadyOk,
    /// Engine identity reported during the handshake.
    Id {
        /// Reported field.
        field: IdField,
        /// Remainder of the line.
        value: String,
    },
    /// Evaluation line, carried verbatim (trimmed).
    Info(String),
    /// Anything else; ignored.
    Other,
}

impl EngineLine {
    /// Classify a raw output line. Surrounding whitespace (including a
    /// trailing `\r`) is ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let line = raw.trim();
        match line {
            "usiok" => return Self::UsiOk,
            "readyok" => return Self::ReadyOk,
            _ => {}
        }

        if is_evaluation_line(line) {
            return Self::Info(line.to_owned());
        }

        let mut tokens = line.splitn(3, char::is_whitespace);
        if tokens.next() == Some("id") {
            let field = match tokens.next() {
                Some("name") => IdField::Name,
                Some("author") => IdField::Author,
                _ => return Self::Other,
            };
            let value = tokens.next().unwrap_or_default().trim().to_owned();
            return Self::Id { field, value };
        }

        Self::Other
    }
}

/// `true` when the trimmed line starts with the `info` token and contains a
/// `score` token.
#[must_use]
pub fn is_evaluation_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.next() == Some("info") && tokens.any(|token| token == "score")
}

/// Score reported by an evaluation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns from the side to move.
    Cp(i64),
    /// Mate in N plies; negative when being mated. `None` for a bare
    /// `mate +`/`mate -` without a distance.
    Mate(Option<i64>),
}

/// The fields of an evaluation line useful for diagnostics.
///
/// The payload sent to the server is always the raw line; this summary only
/// feeds debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoSummary {
    /// `depth` value.
    pub depth: Option<u32>,
    /// `multipv` index.
    pub multipv: Option<u32>,
    /// `score` value.
    pub score: Option<Score>,
}

impl InfoSummary {
    /// Extract depth, multipv and score from an evaluation line. Unknown or
    /// malformed fields are skipped.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut summary = Self::default();
        let mut tokens = line.split_whitespace();

        while let Some(token) = tokens.next() {
            match token {
                "depth" => summary.depth = tokens.next().and_then(|t| t.parse().ok()),
                "multipv" => summary.multipv = tokens.next().and_then(|t| t.parse().ok()),
                "score" => {
                    summary.score = match tokens.next() {
                        Some("cp") => tokens.next().and_then(|t| t.parse().ok()).map(Score::Cp),
                        Some("mate") => Some(Score::Mate(
                            tokens.next().and_then(|t| t.parse().ok()),
                        )),
                        _ => None,
                    };
                }
                // Everything after `pv` or `string` is free text.
                "pv" | "string" => break,
                _ => {}
            }
        }

        summary
    }
}
