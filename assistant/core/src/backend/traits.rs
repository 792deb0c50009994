//! Chat Backend Traits
//!
//! The text-generation service is an opaque producer of a byte stream. This
//! trait is the only seam between the stream controller and the network, so
//! tests can substitute scripted streams.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::TransportError;

/// Response body as a stream of raw chunks
///
/// Chunk boundaries carry no meaning. Dropping the stream releases the
/// underlying connection.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Body of a chat request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// The user's question
    pub message: String,
}

impl ChatRequest {
    /// Create a request for one user message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Chat backend trait
///
/// Implement this trait to talk to a different text-generation endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "HTTP")
    fn name(&self) -> &str;

    /// Check if the endpoint is reachable
    async fn health_check(&self) -> bool;

    /// Issue a request and return the response body as a byte stream
    ///
    /// Resolves once response headers arrive. A non-success status is an
    /// error, not a stream.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}
