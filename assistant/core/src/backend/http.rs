//! HTTP Backend Implementation
//!
//! Talks to the lounge backend's streaming chat route.
//!
//! # Endpoint
//!
//! `POST {endpoint}{chat_path}` with `{"message": "..."}`; the response is
//! `text/event-stream` carrying `data:` lines.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{ByteStream, ChatBackend, ChatRequest};
use crate::config::AssistantConfig;
use crate::error::TransportError;

/// HTTP chat backend
#[derive(Clone, Debug)]
pub struct HttpChatBackend {
    /// Full URL of the chat route
    chat_url: String,
    /// Base URL used for health checks
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpChatBackend {
    /// Create a backend from configuration
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] if the HTTP client cannot be built.
    pub fn new(config: &AssistantConfig) -> Result<Self, TransportError> {
        // No overall timeout: the body of a streaming response may stay open
        // for as long as the model is generating.
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            chat_url: config.chat_url(),
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Create from environment variables
    ///
    /// # Errors
    ///
    /// See [`HttpChatBackend::new`].
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(&AssistantConfig::from_env())
    }

    /// Get the chat URL
    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(&self.base_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        tracing::debug!(url = %self.chat_url, "Opening chat stream");

        let response = self
            .http_client
            .post(&self.chat_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::Body(e.to_string()))
        });
        Ok(stream.boxed())
    }
}
