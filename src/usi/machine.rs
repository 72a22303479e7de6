//! Handshake and analysis state machine.
//!
//! [`ProtocolMachine`] is pure: it consumes engine lines and remote requests
//! and answers with the [`Command`]s to write, never touching the process
//! itself. The [`EngineSupervisor`](crate::usi::supervisor::EngineSupervisor)
//! owns one machine and performs the writes.
//!
//! ```text
//! Idle ─start─▶ Started ─usi─▶ AwaitingHandshake ─usiok─▶ ConfiguringOptions
//!   ─setoption…,isready─▶ AwaitingReady ─readyok─▶ Ready ◀─stop─▶ Analyzing
//! any ─exit/shutdown─▶ Terminated
//! ```

use std::fmt::{Display, Formatter};

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::EngineOption;
use crate::usi::protocol::{Command, EngineLine, IdField, InfoSummary};
use crate::usi::throttle::InfoThrottler;

/// Number of position-descriptor characters echoed to the log.
const SFEN_LOG_CHARS: usize = 20;

/// Engine readiness as seen by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// No subprocess.
    Idle,
    /// Subprocess launched; handshake not yet sent.
    Started,
    /// `usi` sent, waiting for `usiok`.
    AwaitingHandshake,
    /// `usiok` received; options being written.
    ConfiguringOptions,
    /// `isready` sent, waiting for `readyok`.
    AwaitingReady,
    /// Accepting analysis requests.
    Ready,
    /// A `go infinite` search is running.
    Analyzing,
    /// Subprocess exited or was stopped.
    Terminated,
}

impl ReadinessState {
    /// `true` in the states where analysis requests are honoured.
    #[must_use]
    pub fn accepts_requests(self) -> bool {
        matches!(self, Self::Ready | Self::Analyzing)
    }
}

impl Display for ReadinessState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::AwaitingHandshake => "awaiting_handshake",
            Self::ConfiguringOptions => "configuring_options",
            Self::AwaitingReady => "awaiting_ready",
            Self::Ready => "ready",
            Self::Analyzing => "analyzing",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What the machine wants done in response to one engine line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Commands to write, in order.
    pub commands: Vec<Command>,
    /// Evaluation line released by the throttler.
    pub update: Option<String>,
}

/// USI handshake and request/stop state machine.
#[derive(Debug)]
pub struct ProtocolMachine {
    state: ReadinessState,
    options: Vec<EngineOption>,
    throttler: InfoThrottler,
    engine_name: Option<String>,
}

impl ProtocolMachine {
    /// Create an `Idle` machine that will apply `options` after `usiok`.
    #[must_use]
    pub fn new(options: Vec<EngineOption>, now: Instant) -> Self {
        Self {
            state: ReadinessState::Idle,
            options,
            throttler: InfoThrottler::new(now),
            engine_name: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// Name the engine reported with `id name`, if any.
    #[must_use]
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    /// A subprocess has been launched for a fresh session.
    ///
    /// Throttle bookkeeping starts over with the session.
    pub fn mark_started(&mut self, now: Instant) {
        self.throttler.reset(now);
        self.engine_name = None;
        self.transition(ReadinessState::Started);
    }

    /// Handshake-identify; moves `Started` to `AwaitingHandshake`.
    pub fn identify(&mut self) -> Vec<Command> {
        if self.state != ReadinessState::Started {
            debug!(state = %self.state, "usi identify ignored outside started state");
            return Vec::new();
        }
        self.transition(ReadinessState::AwaitingHandshake);
        vec![Command::Usi]
    }

    /// React to one raw line of engine output.
    ///
    /// Unrecognised lines and acknowledgements arriving in the wrong state
    /// produce an empty reaction.
    pub fn on_line(&mut self, raw: &str, now: Instant) -> Reaction {
        match EngineLine::parse(raw) {
            EngineLine::UsiOk => Reaction {
                commands: self.on_usiok(),
                update: None,
            },
            EngineLine::ReadyOk => Reaction {
                commands: self.on_readyok(),
                update: None,
            },
            EngineLine::Info(line) => {
                let summary = InfoSummary::parse(&line);
                debug!(depth = ?summary.depth, multipv = ?summary.multipv, score = ?summary.score, "engine info");
                Reaction {
                    commands: Vec::new(),
                    update: self.throttler.observe(line, now),
                }
            }
            EngineLine::Id { field, value } => {
                match field {
                    IdField::Name => {
                        info!(engine = %value, "engine identified");
                        self.engine_name = Some(value);
                    }
                    IdField::Author => debug!(author = %value, "engine author"),
                }
                Reaction::default()
            }
            EngineLine::Other => Reaction::default(),
        }
    }

    /// Start analysing `sfen`.
    ///
    /// Returns `stop`, `position sfen …`, `go infinite` when the engine is
    /// `Ready` or `Analyzing`; otherwise the request is dropped and nothing is
    /// returned. An empty descriptor is dropped as well.
    pub fn request_analysis(&mut self, sfen: &str) -> Vec<Command> {
        if !self.state.accepts_requests() {
            debug!(state = %self.state, "engine not ready, dropping analysis request");
            return Vec::new();
        }

        let sfen = sfen.trim();
        if sfen.is_empty() {
            debug!("empty position descriptor, dropping analysis request");
            return Vec::new();
        }

        let preview: String = sfen.chars().take(SFEN_LOG_CHARS).collect();
        info!(sfen = %preview, "analysis started");
        self.transition(ReadinessState::Analyzing);

        vec![
            Command::Stop,
            Command::Position {
                sfen: sfen.to_owned(),
            },
            Command::GoInfinite,
        ]
    }

    /// Stop the running analysis.
    ///
    /// The engine never acknowledges `stop`, so the machine returns to
    /// `Ready` immediately. Sending `stop` while already `Ready` is harmless
    /// and is passed through.
    pub fn stop_analysis(&mut self) -> Vec<Command> {
        if !self.state.accepts_requests() {
            debug!(state = %self.state, "engine not ready, dropping stop request");
            return Vec::new();
        }

        info!("analysis stopped");
        self.transition(ReadinessState::Ready);
        vec![Command::Stop]
    }

    /// Explicit shutdown: returns `quit` if a subprocess was live.
    pub fn shutdown(&mut self) -> Vec<Command> {
        let live = !matches!(
            self.state,
            ReadinessState::Idle | ReadinessState::Terminated
        );
        self.terminate();
        if live {
            vec![Command::Quit]
        } else {
            Vec::new()
        }
    }

    /// The subprocess is gone.
    pub fn terminate(&mut self) {
        self.throttler.reset(Instant::now());
        if self.state != ReadinessState::Idle {
            self.transition(ReadinessState::Terminated);
        }
    }

    fn on_usiok(&mut self) -> Vec<Command> {
        if self.state != ReadinessState::AwaitingHandshake {
            debug!(state = %self.state, "unexpected usiok ignored");
            return Vec::new();
        }
        self.transition(ReadinessState::ConfiguringOptions);

        let mut commands: Vec<Command> = self
            .options
            .iter()
            .map(|option| Command::SetOption {
                name: option.name.clone(),
                value: option.value.clone(),
            })
            .collect();
        commands.push(Command::IsReady);

        self.transition(ReadinessState::AwaitingReady);
        commands
    }

    fn on_readyok(&mut self) -> Vec<Command> {
        if self.state != ReadinessState::AwaitingReady {
            debug!(state = %self.state, "unexpected readyok ignored");
            return Vec::new();
        }
        info!("engine ready");
        self.transition(ReadinessState::Ready);
        vec![Command::UsiNewGame]
    }

    fn transition(&mut self, next: ReadinessState) {
        debug!(from = %self.state, to = %next, "usi state transition");
        self.state = next;
    }
}
