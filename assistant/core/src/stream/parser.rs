//! Frame Parser
//!
//! Turns one complete data line into a [`FrameEvent`].
//!
//! Upstream may interleave heartbeat or comment frames, so anything that does
//! not carry a fragment is skipped rather than treated as fatal.

use thiserror::Error;

use crate::config::WireFormat;

/// Result of parsing one line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// Append this text to the in-progress message
    Fragment(String),
    /// The sentinel arrived; the stream is complete
    EndOfStream,
    /// Not a fragment (foreign prefix, malformed payload, or after the sentinel)
    Ignored,
}

/// Why a data frame carried no fragment
#[derive(Debug, Error)]
pub(crate) enum MalformedFrame {
    #[error("payload is not JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload has no string field `{0}`")]
    MissingField(String),
}

/// Stateful parser for one session
///
/// Once the sentinel has been seen every further line is ignored.
#[derive(Clone, Debug)]
pub struct FrameParser {
    wire: WireFormat,
    finished: bool,
    skipped: u32,
}

impl FrameParser {
    /// Create a parser for the given wire format
    #[must_use]
    pub fn new(wire: WireFormat) -> Self {
        Self {
            wire,
            finished: false,
            skipped: 0,
        }
    }

    /// Whether the end-of-stream sentinel has been seen
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of data frames skipped as malformed
    #[must_use]
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Parse one complete line
    pub fn parse_line(&mut self, line: &str) -> FrameEvent {
        if self.finished {
            return FrameEvent::Ignored;
        }

        let Some(payload) = line.strip_prefix(self.wire.data_prefix.as_str()) else {
            return FrameEvent::Ignored;
        };
        let payload = payload.trim();

        if payload == self.wire.done_sentinel {
            self.finished = true;
            return FrameEvent::EndOfStream;
        }

        match self.fragment(payload) {
            Ok(text) => FrameEvent::Fragment(text),
            Err(reason) => {
                self.skipped += 1;
                tracing::debug!(reason = %reason, "Skipping malformed frame");
                FrameEvent::Ignored
            }
        }
    }

    fn fragment(&self, payload: &str) -> Result<String, MalformedFrame> {
        let data: serde_json::Value = serde_json::from_str(payload)?;
        data.get(&self.wire.token_field)
            .and_then(serde_json::Value::as_str)
            .map(String::from)
            .ok_or_else(|| MalformedFrame::MissingField(self.wire.token_field.clone()))
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(WireFormat::default())
    }
}
