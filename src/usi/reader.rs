//! Engine output reader tasks.
//!
//! [`run_reader`] pulls raw chunks from the engine's stdout, runs them
//! through a [`LineAssembler`], and forwards each complete line as an
//! [`EngineEventKind::Line`]. [`run_stderr_filter`] does the same for
//! stderr but only logs: lines that look like failures are surfaced as
//! warnings, the rest stay at `DEBUG`.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::usi::codec::LineAssembler;
use crate::usi::supervisor::{EngineEvent, EngineEventKind};

/// Read buffer size for a single pipe read.
const READ_CHUNK: usize = 8 * 1024;

/// Lower-cased fragments marking a stderr line as a failure report.
pub const FAILURE_KEYWORDS: &[&str] = &["error", "failed", "cannot open"];

/// `true` if a stderr line reports a failure worth showing the operator.
#[must_use]
pub fn is_failure_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    FAILURE_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Stdout reader task: emits one event per complete engine line.
///
/// Stops on EOF, on a read error, when `event_tx` closes, or when `cancel`
/// fires. A trailing unterminated fragment at EOF is discarded. Process exit
/// is reported by the exit monitor, not here.
pub async fn run_reader<R>(
    generation: u64,
    mut stdout: R,
    event_tx: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut assembler = LineAssembler::new();
    let mut chunk = BytesMut::with_capacity(READ_CHUNK);

    loop {
        chunk.clear();
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(generation, "usi reader: cancellation received, stopping");
                break;
            }

            read = stdout.read_buf(&mut chunk) => {
                match read {
                    Ok(0) => {
                        debug!(
                            generation,
                            discarded = assembler.pending().len(),
                            "usi reader: EOF detected"
                        );
                        break;
                    }
                    Ok(_) => {
                        for line in assembler.feed(&chunk) {
                            let event = EngineEvent {
                                generation,
                                kind: EngineEventKind::Line(line),
                            };
                            if event_tx.send(event).await.is_err() {
                                debug!(generation, "usi reader: event_tx closed, stopping");
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(generation, %err, "usi reader: IO error, stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Stderr filter task: logs failure lines as warnings, drops the rest.
pub async fn run_stderr_filter<R>(generation: u64, mut stderr: R, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let mut assembler = LineAssembler::new();
    let mut chunk = BytesMut::with_capacity(READ_CHUNK);

    loop {
        chunk.clear();
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            read = stderr.read_buf(&mut chunk) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        for line in assembler.feed(&chunk) {
                            let line = line.trim();
                            if is_failure_line(line) {
                                warn!(generation, message = line, "engine reported an error");
                            } else if !line.is_empty() {
                                debug!(generation, message = line, "engine stderr");
                            }
                        }
                    }
                    Err(err) => {
                        debug!(generation, %err, "usi stderr: IO error, stopping");
                        break;
                    }
                }
            }
        }
    }
}
