//! Streaming Session
//!
//! One outstanding request tied to one user message. A session owns the
//! response body, the decoder/parser pair and the abort handle; the
//! [`ChatPanel`](crate::ChatPanel) drives it.
//!
//! # Invariants
//!
//! - Status moves forward only; terminal statuses are absorbing.
//! - After a terminal transition the session never touches the conversation.
//! - The response body is released exactly once.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::backend::{ByteStream, ChatRequest};
use crate::config::WireFormat;
use crate::conversation::{Conversation, Outcome};
use crate::messages::{MessageId, SessionId, SessionStatus};
use crate::stream::{DecodeError, FrameEvent, FrameParser, LineDecoder};

/// Abort handle for a session
///
/// Cheap to clone; may be moved to another task. Cancelling is idempotent and
/// has no effect once the session is terminal.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: SessionId,
    token: CancellationToken,
}

impl SessionHandle {
    /// Session this handle controls
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Response body lifecycle
enum Body {
    NotRequested,
    Open(ByteStream),
    Released,
}

/// What one chunk did to the conversation
#[derive(Debug, Default)]
pub(crate) struct Applied {
    /// Fragments appended, in order
    pub fragments: Vec<String>,
    /// The sentinel was reached
    pub end_of_stream: bool,
    /// Cancellation was observed before a mutation
    pub cancelled: bool,
}

/// State of one streaming request
pub(crate) struct StreamSession {
    id: SessionId,
    message_id: MessageId,
    request: ChatRequest,
    status: SessionStatus,
    token: CancellationToken,
    body: Body,
    decoder: LineDecoder,
    parser: FrameParser,
    started_at: Instant,
    fragments: u32,
    bytes: usize,
}

impl StreamSession {
    pub fn new(request: ChatRequest, message_id: MessageId, wire: &WireFormat) -> Self {
        Self {
            id: SessionId::new(),
            message_id,
            request,
            status: SessionStatus::Pending,
            token: CancellationToken::new(),
            body: Body::NotRequested,
            decoder: LineDecoder::new(wire.data_prefix.clone()),
            parser: FrameParser::new(wire.clone()),
            started_at: Instant::now(),
            fragments: 0,
            bytes: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id.clone(),
            token: self.token.clone(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.body, Body::NotRequested)
    }

    pub fn body_mut(&mut self) -> Option<&mut ByteStream> {
        match &mut self.body {
            Body::Open(body) => Some(body),
            Body::NotRequested | Body::Released => None,
        }
    }

    pub fn attach(&mut self, body: ByteStream) {
        if self.status.is_terminal() {
            // Dropping releases the connection
            return;
        }
        self.body = Body::Open(body);
    }

    /// Move to a non-terminal status
    pub fn advance(&mut self, next: SessionStatus) -> bool {
        if self.status.is_terminal() || self.status == next {
            return false;
        }
        tracing::debug!(session_id = %self.id, from = ?self.status, to = ?next, "Session transition");
        self.status = next;
        true
    }

    /// Move to a terminal status, finalize the message and release the body
    ///
    /// Returns `false` if the session was already terminal.
    pub fn terminate(
        &mut self,
        status: SessionStatus,
        outcome: Outcome,
        conversation: &mut Conversation,
    ) -> bool {
        debug_assert!(status.is_terminal());
        if !self.advance(status) {
            return false;
        }

        if status == SessionStatus::Cancelled {
            self.token.cancel();
        }
        self.release();

        if self.owns_in_progress(conversation) {
            conversation.finalize_in_progress(outcome);
        }

        tracing::info!(
            session_id = %self.id,
            status = ?status,
            fragments = self.fragments,
            bytes = self.bytes,
            skipped = self.parser.skipped(),
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "Session finished"
        );
        true
    }

    /// Drop the response body; safe to call repeatedly
    pub fn release(&mut self) {
        if let Body::Open(_) = std::mem::replace(&mut self.body, Body::Released) {
            tracing::debug!(session_id = %self.id, "Released response body");
        }
    }

    /// Decode a chunk and apply its fragments in order
    ///
    /// Cancellation is checked immediately before every mutation.
    pub fn apply_chunk(
        &mut self,
        chunk: &[u8],
        conversation: &mut Conversation,
    ) -> Result<Applied, DecodeError> {
        self.bytes += chunk.len();
        self.decoder.push(chunk)?;

        let mut applied = Applied::default();
        while let Some(line) = self.decoder.next_line() {
            match self.parser.parse_line(&line) {
                FrameEvent::Fragment(text) => {
                    if self.token.is_cancelled() || self.status.is_terminal() {
                        applied.cancelled = true;
                        break;
                    }
                    if !self.owns_in_progress(conversation) {
                        tracing::warn!(session_id = %self.id, "In-progress message no longer owned by session");
                        break;
                    }
                    conversation.append_fragment(&text);
                    self.fragments += 1;
                    applied.fragments.push(text);
                }
                FrameEvent::EndOfStream => {
                    applied.end_of_stream = true;
                    break;
                }
                FrameEvent::Ignored => {}
            }
        }
        Ok(applied)
    }

    /// Stream closed; discard any unterminated tail
    pub fn close_decoder(&mut self) {
        self.decoder.finish();
    }

    fn owns_in_progress(&self, conversation: &Conversation) -> bool {
        conversation
            .in_progress()
            .is_some_and(|m| m.id == self.message_id)
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("message_id", &self.message_id)
            .field("status", &self.status)
            .field("fragments", &self.fragments)
            .finish_non_exhaustive()
    }
}
