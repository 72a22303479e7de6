//! Engine command writer task.
//!
//! Receives [`Command`]s from an unbounded channel and writes each as one
//! `\n`-terminated line to the engine's stdin through a [`FramedWrite`] over
//! [`UsiCodec`]. Queueing is unbounded so callers can enqueue from
//! synchronous code without ever blocking.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use crate::usi::codec::UsiCodec;
use crate::usi::protocol::Command;
use crate::{AppError, Result};

/// Writer task: drains `command_rx` into `stdin`.
///
/// There is no cancellation token: the task ends once every sender is
/// dropped and the queue is drained, so a final `quit` is always written
/// before stdin closes.
///
/// # Errors
///
/// Returns [`AppError::Engine`]`("write failed: …")` if the engine's stdin
/// is gone.
pub async fn run_writer<W>(
    generation: u64,
    stdin: W,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(stdin, UsiCodec::new());

    while let Some(command) = command_rx.recv().await {
        debug!(generation, %command, "usi >");
        framed.send(command.to_string()).await.map_err(|err| {
            warn!(generation, %err, "usi writer: write to stdin failed");
            AppError::Engine(format!("write failed: {err}"))
        })?;
    }

    debug!(generation, "usi writer: command channel closed, stopping");
    Ok(())
}
