//! USI line framing.
//!
//! The engine writes newline-terminated text, but the pipe delivers it in
//! arbitrary chunks. [`UsiCodec`] splits a buffer on `\n`; [`LineAssembler`]
//! owns the carry-over buffer between chunks and yields each complete line
//! exactly once, in arrival order.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut assembler = LineAssembler::new();
//! for line in assembler.feed(b"usiok\nready") {
//!     // "usiok"; "ready" stays buffered until its terminator arrives
//! }
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum unterminated line length accepted from the engine: 1 MiB.
///
/// A carry-over segment growing past this limit is discarded so a
/// misbehaving engine cannot make the connector allocate without bound.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited codec for engine stdio.
///
/// # Decoder
///
/// Yields the bytes before each `\n` as a `String` (invalid UTF-8 is
/// replaced, not rejected). The terminator itself is consumed; a preceding
/// `\r` is kept and left to the caller's trimming. An empty segment
/// (`"\n"` alone) decodes to an empty line.
///
/// # Encoder
///
/// Outbound commands are encoded as `item\n`.
#[derive(Debug, Clone)]
pub struct UsiCodec {
    max_length: usize,
}

impl UsiCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom unterminated-line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for UsiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for UsiCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated line from `src`.
    ///
    /// Returns `Ok(None)` while `src` holds no terminator. Returns
    /// `Err(AppError::Engine("line too long: …"))` after clearing `src` when
    /// the pending segment exceeds the configured limit.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(pos) = src.iter().position(|&b| b == b'\n') {
            let line = src.split_to(pos);
            src.advance(1);
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }

        if src.len() > self.max_length {
            let dropped = src.len();
            src.clear();
            return Err(AppError::Engine(format!(
                "line too long: discarded {dropped} bytes without a terminator"
            )));
        }

        Ok(None)
    }
}

impl Encoder<String> for UsiCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len() + 1);
        dst.put(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Carry-over buffer turning output chunks into complete lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    codec: UsiCodec,
    carry: BytesMut,
}

impl LineAssembler {
    /// Create an assembler with an empty carry-over buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and iterate over every line it completes.
    ///
    /// Lines are produced lazily; bytes after the last terminator stay in the
    /// carry-over buffer for the next call. Dropping the iterator early keeps
    /// the remaining complete lines buffered for the next `feed`.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.carry.extend_from_slice(chunk);
        Lines { assembler: self }
    }

    /// Bytes received since the last terminator.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

/// Iterator returned by [`LineAssembler::feed`].
#[derive(Debug)]
pub struct Lines<'a> {
    assembler: &'a mut LineAssembler,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let LineAssembler { codec, carry } = &mut *self.assembler;
        loop {
            match codec.decode(carry) {
                Ok(line) => return line,
                Err(err) => warn!(%err, "usi framing error, dropping partial line"),
            }
        }
    }
}
