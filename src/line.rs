//! Carriage-return line assembly over a streaming byte source.
//!
//! Serial devices deliver bytes in arbitrary chunks. [`LineAssembler`]
//! accumulates those chunks and yields every complete line as soon as its
//! delimiter arrives, keeping any unterminated remainder for the next read.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use log::warn;
use tokio_util::codec::Decoder;

/// Byte terminating each line emitted by the device.
pub const LINE_DELIMITER: u8 = b'\r';

/// Default upper bound for a pending, unterminated line (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits a stream of byte chunks into carriage-return terminated lines.
///
/// The delimiter is never part of an emitted line. Zero-length lines are
/// emitted as-is; filtering them is the caller's concern.
///
/// A line longer than the configured maximum is dropped whole: once the
/// limit is hit, every byte up to and including the next delimiter is
/// discarded, so no fragment of it is ever emitted.
///
/// # Examples
///
/// ```
/// use linebridge::line::LineAssembler;
///
/// let mut assembler = LineAssembler::new();
/// assert!(assembler.feed(b"AB").is_empty());
///
/// let lines = assembler.feed(b"C\r");
/// assert_eq!(lines.len(), 1);
/// assert_eq!(&lines[0][..], b"ABC");
/// ```
#[derive(Debug)]
pub struct LineAssembler {
    buffer: BytesMut,
    max_line_length: usize,
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self { Self::new() }
}

impl LineAssembler {
    /// Create an assembler using [`DEFAULT_MAX_LINE_LENGTH`].
    #[must_use]
    pub fn new() -> Self { Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH) }

    /// Create an assembler that discards a pending line once it grows past
    /// `max_line_length` bytes without a delimiter.
    ///
    /// A limit of zero is raised to one byte.
    #[must_use]
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_line_length: max_line_length.max(1),
            discarding: false,
        }
    }

    /// Append `chunk` and return every line it completes, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        self.enforce_limit();
        lines
    }

    /// Bytes received since the last delimiter.
    #[must_use]
    pub fn buffered(&self) -> &[u8] { &self.buffer }

    /// Whether bytes are being skipped until the end of an oversized line.
    #[must_use]
    pub fn is_discarding(&self) -> bool { self.discarding }

    fn next_line(&mut self) -> Option<Bytes> {
        loop {
            let found = self.buffer.iter().position(|&b| b == LINE_DELIMITER);
            if self.discarding {
                let Some(pos) = found else {
                    self.buffer.clear();
                    return None;
                };
                self.buffer.advance(pos + 1);
                self.discarding = false;
                continue;
            }

            let pos = found?;
            if pos > self.max_line_length {
                warn!(
                    "discarding oversized line: len={pos}, max_line_length={}",
                    self.max_line_length
                );
                self.buffer.advance(pos + 1);
                continue;
            }
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            return Some(line.freeze());
        }
    }

    fn enforce_limit(&mut self) {
        if self.buffer.len() > self.max_line_length {
            warn!(
                "discarding unterminated line: pending={}, max_line_length={}",
                self.buffer.len(),
                self.max_line_length
            );
            self.buffer.clear();
            self.discarding = true;
        }
    }
}

impl Decoder for LineAssembler {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            let chunk = src.split();
            self.buffer.extend_from_slice(&chunk);
        }
        let line = self.next_line();
        if line.is_none() {
            self.enforce_limit();
        }
        Ok(line)
    }
}
