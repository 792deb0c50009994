//! Error Types
//!
//! Errors visible to callers of the assistant core.
//!
//! # Propagation
//!
//! - [`AssistantError::Validation`] and [`AssistantError::InvalidState`] are
//!   returned synchronously from [`ChatPanel::send`](crate::ChatPanel::send)
//!   before any network call is made.
//! - [`TransportError`] is produced by backends and the stream controller. The
//!   controller never returns it to the caller of `send`; it is converted into
//!   a fixed notice on the in-progress assistant message instead.
//! - Malformed frames are internal to the parser and never surface here.

use thiserror::Error;

use crate::stream::DecodeError;

/// Errors returned to callers of the assistant core
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The outgoing message was rejected before any network call
    #[error("validation failed: {0}")]
    Validation(String),

    /// The conversation is not in a state that allows the operation
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The text-generation endpoint could not be reached or failed mid-stream
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures talking to the text-generation endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, request could not be sent
    #[error("connection failed: {0}")]
    Connect(String),

    /// The endpoint answered with a non-success status
    #[error("endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// Reading the response body failed (reset, truncated transfer, ...)
    #[error("response body failed: {0}")]
    Body(String),

    /// No bytes arrived within the configured idle timeout
    #[error("no data received for {0:?}")]
    IdleTimeout(std::time::Duration),

    /// The byte stream could not be framed
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_builder() || err.is_request() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Body(err.to_string())
        }
    }
}
