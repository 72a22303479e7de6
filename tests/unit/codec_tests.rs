//! Unit tests for USI line framing.
//!
//! Covers:
//! - lines split across chunk boundaries are emitted once, in order
//! - a terminator as the first byte yields an empty line
//! - `\r\n` split across chunks
//! - every two-chunk split of a transcript yields the same lines
//! - oversize unterminated segments are rejected and discarded
//! - outbound encoding appends `\n`

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use shogistack_connector::usi::codec::{LineAssembler, UsiCodec};
use shogistack_connector::AppError;

fn collect(assembler: &mut LineAssembler, chunk: &str) -> Vec<String> {
    assembler.feed(chunk.as_bytes()).collect()
}

// ── Chunk boundaries ─────────────────────────────────────────────────────────

/// A line spread over two chunks is only emitted once its terminator arrives.
#[test]
fn evaluation_lines_split_across_chunks_are_reassembled() {
    let mut assembler = LineAssembler::new();

    let first = collect(&mut assembler, "info depth 1");
    let second = collect(&mut assembler, " score cp 10\ninfo dep");
    let third = collect(&mut assembler, "th 2 score cp 12\n");

    assert!(first.is_empty(), "no terminator yet, nothing may be emitted");
    assert_eq!(second, vec!["info depth 1 score cp 10".to_owned()]);
    assert_eq!(third, vec!["info depth 2 score cp 12".to_owned()]);
    assert!(assembler.pending().is_empty());
}

/// A chunk starting with the terminator completes the (empty) carry-over.
#[test]
fn leading_terminator_yields_empty_line() {
    let mut assembler = LineAssembler::new();

    let lines = collect(&mut assembler, "\nusiok\n");

    assert_eq!(lines, vec![String::new(), "usiok".to_owned()]);
}

/// A line finished by a chunk that is only `\n` is emitted with that chunk.
#[test]
fn terminator_alone_in_its_own_chunk() {
    let mut assembler = LineAssembler::new();

    assert!(collect(&mut assembler, "readyok").is_empty());
    assert_eq!(collect(&mut assembler, "\n"), vec!["readyok".to_owned()]);
}

/// A CRLF pair split over two chunks still produces exactly one line; the
/// carriage return is left for the caller's trimming.
#[test]
fn crlf_split_across_chunks() {
    let mut assembler = LineAssembler::new();

    assert!(collect(&mut assembler, "usiok\r").is_empty());
    assert_eq!(
        collect(&mut assembler, "\nreadyok\r\n"),
        vec!["usiok\r".to_owned(), "readyok\r".to_owned()]
    );
}

/// Lines already emitted are never emitted again by later feeds.
#[test]
fn lines_are_never_emitted_twice() {
    let mut assembler = LineAssembler::new();

    assert_eq!(collect(&mut assembler, "usiok\n"), vec!["usiok".to_owned()]);
    assert!(collect(&mut assembler, "").is_empty());
    assert!(collect(&mut assembler, "ready").is_empty());
    assert_eq!(collect(&mut assembler, "ok\n"), vec!["readyok".to_owned()]);
}

/// Wherever a transcript is cut in two, the emitted lines are identical and
/// only the unterminated tail stays buffered.
#[test]
fn every_split_point_yields_the_same_lines() {
    let transcript = "id name Fake\nusiok\n\nreadyok\ninfo depth 3 score cp -20 pv 3c3d\ntail";
    let expected = vec![
        "id name Fake".to_owned(),
        "usiok".to_owned(),
        String::new(),
        "readyok".to_owned(),
        "info depth 3 score cp -20 pv 3c3d".to_owned(),
    ];

    for cut in 0..=transcript.len() {
        let (head, tail) = transcript.split_at(cut);
        let mut assembler = LineAssembler::new();

        let mut lines = collect(&mut assembler, head);
        lines.extend(collect(&mut assembler, tail));

        assert_eq!(lines, expected, "split at byte {cut}");
        assert_eq!(assembler.pending(), b"tail", "split at byte {cut}");
    }
}

/// `reset` forgets a partial line.
#[test]
fn reset_discards_partial_line() {
    let mut assembler = LineAssembler::new();

    assert!(collect(&mut assembler, "info dep").is_empty());
    assembler.reset();

    assert_eq!(collect(&mut assembler, "readyok\n"), vec!["readyok".to_owned()]);
}

// ── Codec ────────────────────────────────────────────────────────────────────

/// An unterminated segment beyond the limit is rejected and dropped.
#[test]
fn oversize_segment_is_discarded() {
    let mut codec = UsiCodec::with_max_length(8);
    let mut buf = BytesMut::from("0123456789");

    let err = codec.decode(&mut buf).expect_err("segment exceeds the limit");

    assert!(
        matches!(err, AppError::Engine(ref msg) if msg.contains("line too long")),
        "unexpected error: {err}"
    );
    assert!(buf.is_empty(), "oversize segment must be cleared");
}

/// A terminated line under the limit decodes; the remainder stays buffered.
#[test]
fn terminated_line_within_limit_decodes() {
    let mut codec = UsiCodec::with_max_length(8);
    let mut buf = BytesMut::from("usiok\nrest");

    assert_eq!(codec.decode(&mut buf).unwrap(), Some("usiok".to_owned()));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    assert_eq!(&buf[..], b"rest");
}

/// Invalid UTF-8 is replaced rather than failing the stream.
#[test]
fn invalid_utf8_is_decoded_lossily() {
    let mut assembler = LineAssembler::new();

    let lines: Vec<String> = assembler.feed(b"info string \xff\n").collect();

    assert_eq!(lines, vec!["info string \u{fffd}".to_owned()]);
}

/// Outbound commands gain exactly one trailing newline.
#[test]
fn encoder_appends_newline() {
    let mut codec = UsiCodec::new();
    let mut dst = BytesMut::new();

    codec.encode("usi".to_owned(), &mut dst).unwrap();
    codec.encode("isready".to_owned(), &mut dst).unwrap();

    assert_eq!(&dst[..], b"usi\nisready\n");
}
