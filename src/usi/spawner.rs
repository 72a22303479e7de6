//! USI engine process spawner.
//!
//! Spawns the engine with:
//! - its working directory set to the executable's parent, so engines find
//!   their evaluation files;
//! - all three stdio streams piped;
//! - `kill_on_drop(true)` so a dropped handle never leaves an orphan engine.

use std::path::Path;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::usi::supervisor::{EngineEvent, EngineEventKind};
use crate::{AppError, Result};

/// Time the engine gets to honour `quit` before it is killed.
pub const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Time the stdout reader gets to forward the last lines of an exited engine
/// before the exit is reported.
pub const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Stdio handles of a freshly spawned engine.
///
/// The caller is responsible for keeping `child` alive (it has
/// `kill_on_drop(true)`) and for draining `stdout` and `stderr`.
#[derive(Debug)]
pub struct EngineProcess {
    /// Child process handle.
    pub child: Child,
    /// Engine stdin for USI commands.
    pub stdin: ChildStdin,
    /// Engine stdout carrying USI responses.
    pub stdout: ChildStdout,
    /// Engine stderr carrying diagnostics.
    pub stderr: ChildStderr,
}

/// `true` if `path` names an existing regular file the current user may
/// execute.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Spawn the engine described by `config`.
///
/// # Errors
///
/// - `AppError::EngineNotFound`: the executable is missing or not
///   executable; nothing is spawned.
/// - `AppError::Engine("failed to spawn engine: …")`: OS spawn failure.
/// - `AppError::Engine("failed to capture …")`: a stdio pipe is missing.
pub fn spawn_engine(config: &EngineConfig) -> Result<EngineProcess> {
    let executable = &config.executable;
    if !is_executable(executable) {
        return Err(AppError::EngineNotFound(executable.clone()));
    }

    let mut child = Command::new(executable)
        .current_dir(config.working_dir())
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| AppError::Engine(format!("failed to spawn engine: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Engine("failed to capture engine stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Engine("failed to capture engine stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Engine("failed to capture engine stderr".into()))?;

    info!(
        engine = %executable.display(),
        pid = child.id(),
        cwd = %config.working_dir().display(),
        "engine spawned"
    );

    Ok(EngineProcess {
        child,
        stdin,
        stdout,
        stderr,
    })
}

/// Spawn a background task that awaits engine exit and emits
/// [`EngineEventKind::Exited`] when it happens.
///
/// `reader` is the session's stdout reader. After the process exits it is
/// awaited for up to [`OUTPUT_DRAIN`], so every line the engine printed is
/// queued ahead of the exit event.
///
/// When `cancel` fires first, the engine is given [`QUIT_GRACE`] to exit on
/// its own and is then killed; no event is emitted in that case.
#[must_use]
pub fn monitor_exit(
    generation: u64,
    mut child: Child,
    reader: JoinHandle<()>,
    event_tx: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = child.wait() => {
                let (code, reason) = match result {
                    Ok(status) => {
                        let code = status.code();
                        let reason = code.map_or_else(
                            || "process terminated by signal".to_owned(),
                            |c| format!("process exited with code {c}"),
                        );
                        (code, reason)
                    }
                    Err(err) => {
                        warn!(generation, %err, "error waiting for engine process");
                        (None, format!("wait error: {err}"))
                    }
                };

                if tokio::time::timeout(OUTPUT_DRAIN, reader).await.is_err() {
                    warn!(generation, "engine stdout still open after exit, reporting exit anyway");
                }

                let event = EngineEvent {
                    generation,
                    kind: EngineEventKind::Exited { code, reason },
                };
                if event_tx.send(event).await.is_err() {
                    warn!(generation, "event_tx closed before engine exit could be delivered");
                }
            }
            () = cancel.cancelled() => {
                if tokio::time::timeout(QUIT_GRACE, child.wait()).await.is_err() {
                    warn!(generation, "engine ignored quit, killing");
                    if let Err(err) = child.kill().await {
                        warn!(generation, %err, "failed to kill engine");
                    }
                }
                info!(generation, "engine process stopped");
            }
        }
    })
}
