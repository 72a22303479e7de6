//! Engine process supervisor.
//!
//! [`EngineSupervisor`] owns at most one [`EngineSession`]: the spawned
//! engine plus its reader, writer, stderr filter, and exit monitor tasks.
//! All of those tasks report into one `mpsc` channel of [`EngineEvent`]s that
//! the connector loop drains and hands back to
//! [`EngineSupervisor::handle_event`]; the supervisor and its
//! [`ProtocolMachine`] are only ever touched from that loop.
//!
//! # Session lifecycle
//!
//! 1. [`start`](EngineSupervisor::start) tears down any previous session,
//!    spawns the engine, wires its streams, and sends `usi`.
//! 2. Engine lines drive the handshake; evaluation lines come back out of
//!    `handle_event` once the throttler releases them.
//! 3. Process exit or [`stop`](EngineSupervisor::stop) ends the session.
//!
//! Every session gets a fresh generation number. Events still in flight from
//! an older session carry the old number and are dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::usi::machine::{ProtocolMachine, ReadinessState};
use crate::usi::protocol::Command;
use crate::usi::reader::{run_reader, run_stderr_filter};
use crate::usi::spawner::{monitor_exit, spawn_engine};
use crate::usi::writer::run_writer;
use crate::Result;

/// Diagnostic hints logged when the engine exits on its own.
const EXIT_HINTS: &[&str] = &[
    "check that the evaluation function files (e.g. nn.bin) are installed next to the engine",
    "check that the engine build matches this CPU (e.g. AVX2 vs SSE4.2 binaries)",
];

/// Something that happened to an engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    /// Session the event belongs to.
    pub generation: u64,
    /// What happened.
    pub kind: EngineEventKind,
}

/// Payload of an [`EngineEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    /// One complete line of engine stdout.
    Line(String),
    /// The engine process exited.
    Exited {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Human-readable reason.
        reason: String,
    },
}

/// Live handles of the currently owned engine.
#[derive(Debug)]
struct EngineSession {
    generation: u64,
    pid: Option<u32>,
    command_tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

/// Owner of the engine subprocess and its protocol state.
#[derive(Debug)]
pub struct EngineSupervisor {
    config: EngineConfig,
    machine: ProtocolMachine,
    session: Option<EngineSession>,
    generation: u64,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl EngineSupervisor {
    /// Create an idle supervisor. Session tasks report into `event_tx`.
    #[must_use]
    pub fn new(config: EngineConfig, event_tx: mpsc::Sender<EngineEvent>) -> Self {
        let machine = ProtocolMachine::new(config.options.clone(), Instant::now());
        Self {
            config,
            machine,
            session: None,
            generation: 0,
            event_tx,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.machine.state()
    }

    /// `true` while a subprocess is owned.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Generation of the owned session, if any.
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.generation)
    }

    /// Name the engine reported during the handshake.
    #[must_use]
    pub fn engine_name(&self) -> Option<&str> {
        self.machine.engine_name()
    }

    /// Spawn the engine and send the handshake.
    ///
    /// Any session already owned is stopped first.
    ///
    /// # Errors
    ///
    /// - `AppError::EngineNotFound`: the executable is missing; the
    ///   supervisor is left without a subprocess.
    /// - `AppError::Engine`: spawning failed.
    pub fn start(&mut self) -> Result<()> {
        self.stop();

        let process = spawn_engine(&self.config)?;

        self.generation += 1;
        let generation = self.generation;
        let pid = process.child.id();
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            if let Err(err) = run_writer(generation, process.stdin, command_rx).await {
                warn!(generation, %err, "usi writer stopped");
            }
        });
        let reader = tokio::spawn(run_reader(
            generation,
            process.stdout,
            self.event_tx.clone(),
            cancel.clone(),
        ));
        tokio::spawn(run_stderr_filter(generation, process.stderr, cancel.clone()));
        let monitor = monitor_exit(
            generation,
            process.child,
            reader,
            self.event_tx.clone(),
            cancel.clone(),
        );

        self.session = Some(EngineSession {
            generation,
            pid,
            command_tx,
            cancel,
            writer,
            monitor,
        });

        self.machine.mark_started(Instant::now());
        let commands = self.machine.identify();
        self.send_all(commands);
        Ok(())
    }

    /// Queue `command` for the engine. Silently does nothing when no
    /// subprocess is owned or its stdin is gone.
    pub fn send(&self, command: Command) {
        let Some(session) = &self.session else {
            debug!(%command, "no engine running, dropping command");
            return;
        };
        if session.command_tx.send(command).is_err() {
            debug!(generation = session.generation, "engine stdin closed, dropping command");
        }
    }

    /// Forward an analysis request; dropped unless the engine is ready.
    pub fn request_analysis(&mut self, sfen: &str) {
        let commands = self.machine.request_analysis(sfen);
        self.send_all(commands);
    }

    /// Forward a stop signal; dropped unless the engine is ready.
    pub fn stop_analysis(&mut self) {
        let commands = self.machine.stop_analysis();
        self.send_all(commands);
    }

    /// Apply one session event, returning an evaluation line to relay.
    pub fn handle_event(&mut self, event: EngineEvent) -> Option<String> {
        if self.generation() != Some(event.generation) {
            debug!(generation = event.generation, "dropping event from stale engine session");
            return None;
        }

        match event.kind {
            EngineEventKind::Line(line) => {
                debug!(line = line.trim_end(), "usi <");
                let reaction = self.machine.on_line(&line, Instant::now());
                self.send_all(reaction.commands);
                reaction.update
            }
            EngineEventKind::Exited { code, reason } => {
                warn!(?code, %reason, "engine process exited");
                for hint in EXIT_HINTS {
                    warn!("  -> {hint}");
                }
                self.machine.terminate();
                if let Some(session) = self.session.take() {
                    session.cancel.cancel();
                }
                None
            }
        }
    }

    /// Send `quit`, request termination, and release the subprocess.
    ///
    /// Session tasks finish in the background.
    pub fn stop(&mut self) {
        // Dropping the handles detaches the tasks; they still run to completion.
        drop(self.teardown());
    }

    /// Like [`stop`](Self::stop), but waits until `quit` has been written and
    /// the process is gone.
    pub async fn shutdown(&mut self) {
        if let Some(EngineSession {
            command_tx,
            writer,
            monitor,
            ..
        }) = self.teardown()
        {
            // The writer drains its queue and exits once the last sender is gone.
            drop(command_tx);
            let _ = writer.await;
            let _ = monitor.await;
        }
    }

    fn teardown(&mut self) -> Option<EngineSession> {
        let commands = self.machine.shutdown();
        self.send_all(commands);

        let session = self.session.take()?;
        info!(generation = session.generation, pid = ?session.pid, "stopping engine");
        session.cancel.cancel();
        Some(session)
    }

    fn send_all(&self, commands: Vec<Command>) {
        for command in commands {
            self.send(command);
        }
    }
}
