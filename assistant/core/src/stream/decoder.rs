//! Line Decoder
//!
//! Turns arbitrarily chunked response bytes into complete text lines.
//!
//! # Framing
//!
//! ```text
//! data: {"token":"Hel"}\n
//! \n
//! data: {"token":"lo"}\n
//! data: [DONE]\n
//! ```
//!
//! Lines are split on the `\n` byte before UTF-8 decoding. `\n` never occurs
//! inside a multi-byte UTF-8 sequence, so a character split across chunks is
//! always reassembled before it is decoded.
//!
//! # Limits
//!
//! No line, complete or pending, may be longer than [`MAX_LINE_BYTES`]; this
//! bounds memory when a peer never sends a newline.

use thiserror::Error;

/// Maximum length of a single line (1 MB)
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Framing failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A line grew past the limit without a newline
    #[error("line of {len} bytes exceeds maximum {max}")]
    LineTooLong {
        /// Bytes buffered for the pending line
        len: usize,
        /// Configured maximum
        max: usize,
    },
}

/// Incremental line decoder
///
/// Feed chunks with [`push`](Self::push), drain lines with
/// [`next_line`](Self::next_line), and call [`finish`](Self::finish) when the
/// byte stream ends.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Position up to which the buffer is known to contain no newline
    scan_pos: usize,
    /// Bytes after the last newline seen by `push`
    pending_len: usize,
    /// Lines not starting with this are dropped
    prefix: String,
    max_line: usize,
}

impl LineDecoder {
    /// Create a decoder yielding lines that start with `prefix`
    ///
    /// An empty prefix yields every non-blank line.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_max_line(prefix, MAX_LINE_BYTES)
    }

    /// Create a decoder with a custom line limit
    #[must_use]
    pub fn with_max_line(prefix: impl Into<String>, max_line: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            scan_pos: 0,
            pending_len: 0,
            prefix: prefix.into(),
            max_line,
        }
    }

    /// Append a chunk of bytes
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::LineTooLong`] if any line in the chunk, complete
    /// or still pending, exceeds the limit.
    pub fn push(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let mut pending = self.pending_len;
        for (i, segment) in data.split(|&b| b == b'\n').enumerate() {
            let len = if i == 0 {
                pending + segment.len()
            } else {
                segment.len()
            };
            if len > self.max_line {
                return Err(DecodeError::LineTooLong {
                    len,
                    max: self.max_line,
                });
            }
            pending = len;
        }

        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.scan_pos -= self.read_pos;
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
        self.pending_len = pending;
        Ok(())
    }

    /// Get the number of unconsumed bytes
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Next complete line matching the prefix, if any
    ///
    /// Blank lines, lines with another prefix and lines that are not valid
    /// UTF-8 are consumed and skipped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let start = self.scan_pos.max(self.read_pos);
            let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') else {
                self.scan_pos = self.buffer.len();
                return None;
            };
            let end = start + offset;

            let mut raw = &self.buffer[self.read_pos..end];
            if let [head @ .., b'\r'] = raw {
                raw = head;
            }
            let line = std::str::from_utf8(raw).map(str::to_owned);

            self.read_pos = end + 1;
            self.scan_pos = self.read_pos;

            match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) if line.starts_with(&self.prefix) => return Some(line),
                Ok(line) => {
                    tracing::trace!(line = %line, "Skipping line without data prefix");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping line with invalid UTF-8");
                }
            }
        }
    }

    /// Signal end of stream
    ///
    /// Any trailing bytes that were never newline-terminated are discarded.
    /// Returns the number of discarded bytes.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buffered();
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "Discarding unterminated trailing line");
        }
        self.clear();
        discarded
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.scan_pos = 0;
        self.pending_len = 0;
    }
}
