//! Unit tests for the stdin writer task.

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use shogistack_connector::usi::protocol::Command;
use shogistack_connector::usi::writer::run_writer;
use shogistack_connector::AppError;

/// Queued commands are written in order, one per line, and the task ends
/// once the queue is closed and drained.
#[tokio::test]
async fn commands_are_written_as_lines() {
    let (writer_side, mut engine_side) = tokio::io::duplex(1024);
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    command_tx.send(Command::Usi).unwrap();
    command_tx
        .send(Command::SetOption {
            name: "USI_Hash".into(),
            value: "1024".into(),
        })
        .unwrap();
    command_tx.send(Command::IsReady).unwrap();
    drop(command_tx);

    run_writer(1, writer_side, command_rx)
        .await
        .expect("writer drains cleanly");

    let mut written = String::new();
    engine_side.read_to_string(&mut written).await.unwrap();
    assert_eq!(written, "usi\nsetoption name USI_Hash value 1024\nisready\n");
}

/// A closed stdin surfaces as an engine error.
#[tokio::test]
async fn closed_stdin_is_an_engine_error() {
    let (writer_side, engine_side) = tokio::io::duplex(64);
    drop(engine_side);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    command_tx.send(Command::Quit).unwrap();

    let err = run_writer(1, writer_side, command_rx)
        .await
        .expect_err("stdin is closed");

    assert!(
        matches!(err, AppError::Engine(ref msg) if msg.starts_with("write failed")),
        "unexpected error: {err}"
    );
}
