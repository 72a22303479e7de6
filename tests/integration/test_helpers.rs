//! Shared fixtures for integration tests: scripted stand-in engines and an
//! event pump that drives a supervisor the way the connector loop does.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use shogistack_connector::config::{EngineConfig, EngineOption};
use shogistack_connector::usi::supervisor::{EngineEvent, EngineSupervisor};

/// Upper bound for any single wait on engine output.
pub const PUMP_TIMEOUT: Duration = Duration::from_secs(10);

/// File, next to the script, that the fake engine appends every command to.
pub const COMMAND_LOG: &str = "commands.log";

/// Minimal USI engine: logs each command to `commands.log` in its working
/// directory and answers the handshake and `go`.
const FAKE_ENGINE: &str = r#"#!/bin/sh
while IFS= read -r line; do
  printf '%s\n' "$line" >> commands.log
  case "$line" in
    usi) printf 'id name FakeEngine\nusiok\n' ;;
    isready) printf 'readyok\n' ;;
    go*) printf 'info depth 1 score cp 10 pv 7g7f\n' ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Engine that identifies itself and then dies, like a binary missing its
/// evaluation files.
const CRASHING_ENGINE: &str = r#"#!/bin/sh
printf 'id name CrashingEngine\nid author nobody\n'
echo 'Error: cannot open eval/nn.bin' >&2
exit 3
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

/// Install the well-behaved fake engine in `dir`.
pub fn fake_engine(dir: &Path) -> PathBuf {
    write_script(dir, "fake-engine.sh", FAKE_ENGINE)
}

/// Install the crashing engine in `dir`.
pub fn crashing_engine(dir: &Path) -> PathBuf {
    write_script(dir, "crashing-engine.sh", CRASHING_ENGINE)
}

/// Engine config with a single `USI_Hash` option.
pub fn engine_config(executable: PathBuf) -> EngineConfig {
    EngineConfig {
        executable,
        options: vec![EngineOption {
            name: "USI_Hash".into(),
            value: "1024".into(),
        }],
    }
}

/// Commands the fake engine has received so far.
pub fn read_log(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join(COMMAND_LOG))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Feed session events into `supervisor` until `done` holds, returning every
/// evaluation line released on the way. Panics after [`PUMP_TIMEOUT`].
pub async fn pump_until<F>(
    supervisor: &mut EngineSupervisor,
    event_rx: &mut mpsc::Receiver<EngineEvent>,
    mut done: F,
) -> Vec<String>
where
    F: FnMut(&EngineSupervisor, &[String]) -> bool,
{
    let mut updates = Vec::new();
    let deadline = tokio::time::Instant::now() + PUMP_TIMEOUT;

    while !done(supervisor, &updates) {
        let event = tokio::time::timeout_at(deadline, event_rx.recv())
            .await
            .expect("timed out waiting for engine events")
            .expect("event channel closed");
        if let Some(update) = supervisor.handle_event(event) {
            updates.push(update);
        }
    }

    updates
}
