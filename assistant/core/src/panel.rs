//! Chat Panel - Stream Session Controller
//!
//! The panel owns one [`Conversation`] and at most one live session against
//! it. It issues the request, drives body bytes through the decoder and
//! parser, applies fragments to the conversation, and guarantees a terminal
//! status on every exit path.
//!
//! # Lifecycle
//!
//! ```text
//!   send() ──▶ Pending ──first byte──▶ Streaming ──[DONE] / close──▶ Done
//!                 │                        │
//!                 ├──── transport error ───┴──▶ Errored
//!                 └──── cancel() ──────────┴──▶ Cancelled
//! ```
//!
//! `send` is synchronous and performs no I/O. Network work happens in
//! [`ChatPanel::pump`], which a surface calls from its event loop (or
//! [`ChatPanel::run`] to drive a session to completion).
//!
//! # Cancellation
//!
//! [`ChatPanel::cancel`] takes effect immediately. A [`SessionHandle`] can be
//! cancelled from another task; the panel observes it while awaiting I/O and
//! before every conversation mutation.
//!
//! # Example
//!
//! ```ignore
//! use assistant_core::{AssistantConfig, ChatPanel, HttpChatBackend};
//!
//! let config = AssistantConfig::from_env();
//! let backend = HttpChatBackend::new(&config)?;
//! let mut panel = ChatPanel::new(backend, config);
//!
//! let handle = panel.send("What's running low today?")?;
//! let status = panel.run().await;
//! println!("{status:?}: {}", panel.conversation().messages().last().unwrap().text);
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::backend::{ByteStream, ChatBackend, ChatRequest};
use crate::config::AssistantConfig;
use crate::conversation::{Conversation, ConversationSnapshot, Outcome};
use crate::error::{AssistantError, TransportError};
use crate::messages::{MessageId, SessionId, SessionStatus};
use crate::session::{SessionHandle, StreamSession};

/// Number of suggestions offered before the first question
const VISIBLE_SUGGESTIONS: usize = 4;

/// Incremental updates for a rendering surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelUpdate {
    /// Session moved to a new status
    StatusChanged {
        /// Session that changed
        session_id: SessionId,
        /// New status
        status: SessionStatus,
    },
    /// A fragment was appended to the in-progress message
    Fragment {
        /// Message receiving the fragment
        message_id: MessageId,
        /// The fragment text
        text: String,
    },
    /// The in-progress message was finalized
    Finished {
        /// Message that was finalized
        message_id: MessageId,
        /// Terminal status of the session
        status: SessionStatus,
        /// Final text (a notice for errors and cancellation)
        text: String,
    },
}

/// One await step on the response body
enum Read {
    Chunk(Vec<u8>),
    Closed,
    Failed(TransportError),
    Cancelled,
}

/// Stream session controller for one conversation
pub struct ChatPanel<B: ChatBackend> {
    /// Chat backend
    backend: Arc<B>,
    /// Configuration
    config: AssistantConfig,
    /// Conversation shown in this panel
    conversation: Conversation,
    /// Most recent session (kept after it ends so its status stays visible)
    session: Option<StreamSession>,
    /// Optional channel to a rendering surface
    updates: Option<mpsc::UnboundedSender<PanelUpdate>>,
}

impl<B: ChatBackend + 'static> ChatPanel<B> {
    /// Create a panel with a fresh conversation
    pub fn new(backend: B, config: AssistantConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            conversation: fresh_conversation(&config),
            config,
            session: None,
            updates: None,
        }
    }

    /// Send [`PanelUpdate`]s to a rendering surface
    #[must_use]
    pub fn with_updates(mut self, tx: mpsc::UnboundedSender<PanelUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    /// The conversation
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Rendering view of the conversation
    ///
    /// A cancellation requested through a [`SessionHandle`] is applied to the
    /// conversation by the next `pump`, `cancel`, `send` or `clear`.
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.conversation.snapshot()
    }

    /// The backend
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Status of the most recent session (`Idle` if none was started)
    ///
    /// A live session whose handle was cancelled reports `Cancelled` even
    /// before the panel has finalized it.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self.session.as_ref() {
            None => SessionStatus::Idle,
            Some(session) if session.status().is_live() && session.is_cancel_requested() => {
                SessionStatus::Cancelled
            }
            Some(session) => session.status(),
        }
    }

    /// Abort handle of the most recent session
    #[must_use]
    pub fn handle(&self) -> Option<SessionHandle> {
        self.session.as_ref().map(StreamSession::handle)
    }

    /// Canned questions to offer, empty once the user has asked something
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        if self.conversation.user_message_count() > 0 {
            return &[];
        }
        let n = self.config.suggestions.len().min(VISIBLE_SUGGESTIONS);
        &self.config.suggestions[..n]
    }

    /// Start a session for a user message
    ///
    /// Any live session is cancelled first. No network I/O happens here;
    /// call [`pump`](Self::pump) or [`run`](Self::run) to drive the session.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::Validation`] if `text` is empty after trimming
    /// - [`AssistantError::InvalidState`] if the conversation still has a
    ///   message in progress that no session owns
    pub fn send(&mut self, text: &str) -> Result<SessionHandle, AssistantError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::Validation(
                "message must not be empty".to_string(),
            ));
        }

        if self.cancel() {
            tracing::debug!("Cancelled previous session before starting a new one");
        }

        if self.conversation.is_streaming() {
            return Err(AssistantError::InvalidState(
                "conversation already has a message in progress".to_string(),
            ));
        }

        self.conversation.append_user_message(text)?;
        let message_id = self.conversation.begin_assistant_message()?;

        let session = StreamSession::new(ChatRequest::new(text), message_id, &self.config.wire);
        let handle = session.handle();
        tracing::info!(
            session_id = %session.id(),
            conversation_id = %self.conversation.id(),
            "Session started"
        );

        self.emit(PanelUpdate::StatusChanged {
            session_id: session.id().clone(),
            status: SessionStatus::Pending,
        });
        self.session = Some(session);
        Ok(handle)
    }

    /// Cancel the live session
    ///
    /// Returns `true` if a session was cancelled; `false` (and no effect) if
    /// there is none or it is already terminal.
    pub fn cancel(&mut self) -> bool {
        self.finish(SessionStatus::Cancelled, Outcome::Cancelled)
    }

    /// Start over with a new conversation (the greeting is re-seeded)
    ///
    /// # Errors
    ///
    /// [`AssistantError::InvalidState`] while a session is live.
    pub fn clear(&mut self) -> Result<(), AssistantError> {
        self.observe_cancellation();
        if self.status().is_live() {
            return Err(AssistantError::InvalidState(
                "cannot clear while a response is streaming".to_string(),
            ));
        }
        self.conversation = fresh_conversation(&self.config);
        self.session = None;
        Ok(())
    }

    /// Advance the live session by one step
    ///
    /// Issues the request if it has not been sent yet, otherwise awaits and
    /// applies the next body chunk. Returns the session status afterwards.
    pub async fn pump(&mut self) -> SessionStatus {
        if self.observe_cancellation() {
            return self.status();
        }
        let Some(session) = self.session.as_ref() else {
            return SessionStatus::Idle;
        };
        if !session.status().is_live() {
            return session.status();
        }

        if session.is_connected() {
            self.read_next().await
        } else {
            self.connect().await
        }
    }

    /// Drive the live session to a terminal status
    pub async fn run(&mut self) -> SessionStatus {
        loop {
            let status = self.pump().await;
            if !status.is_live() {
                return status;
            }
        }
    }

    /// Send a message and drive the session to completion
    ///
    /// # Errors
    ///
    /// Only the synchronous errors of [`send`](Self::send); transport
    /// failures end the session as [`SessionStatus::Errored`].
    pub async fn ask(&mut self, text: &str) -> Result<SessionStatus, AssistantError> {
        self.send(text)?;
        Ok(self.run().await)
    }

    async fn connect(&mut self) -> SessionStatus {
        let Some(session) = self.session.as_mut() else {
            return SessionStatus::Idle;
        };
        let token = session.token();
        let request = session.request().clone();

        let opened = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = self.backend.open_stream(&request) => Some(result),
        };

        match opened {
            None => {
                self.finish(SessionStatus::Cancelled, Outcome::Cancelled);
            }
            Some(Ok(body)) => {
                tracing::debug!(session_id = %session.id(), "Response headers received");
                session.attach(body);
            }
            Some(Err(e)) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Failed to open chat stream");
                self.finish(SessionStatus::Errored, Outcome::Failed);
            }
        }
        self.status()
    }

    async fn read_next(&mut self) -> SessionStatus {
        let idle = self.config.idle_timeout();
        let Some(session) = self.session.as_mut() else {
            return SessionStatus::Idle;
        };
        let token = session.token();
        let Some(body) = session.body_mut() else {
            return session.status();
        };

        let read = tokio::select! {
            biased;
            () = token.cancelled() => Read::Cancelled,
            read = next_chunk(body, idle) => read,
        };

        match read {
            Read::Chunk(chunk) => self.apply(&chunk),
            Read::Closed => {
                session.close_decoder();
                if session.status() == SessionStatus::Pending {
                    tracing::warn!(session_id = %session.id(), "Stream closed before any data");
                    self.finish(SessionStatus::Errored, Outcome::Failed);
                } else {
                    self.finish(SessionStatus::Done, Outcome::Completed);
                }
            }
            Read::Failed(e) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Chat stream failed");
                self.finish(SessionStatus::Errored, Outcome::Failed);
            }
            Read::Cancelled => {
                self.finish(SessionStatus::Cancelled, Outcome::Cancelled);
            }
        }
        self.status()
    }

    fn apply(&mut self, chunk: &[u8]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if chunk.is_empty() {
            return;
        }

        if session.advance(SessionStatus::Streaming) {
            emit(
                self.updates.as_ref(),
                PanelUpdate::StatusChanged {
                    session_id: session.id().clone(),
                    status: SessionStatus::Streaming,
                },
            );
        }

        match session.apply_chunk(chunk, &mut self.conversation) {
            Ok(applied) => {
                for text in applied.fragments {
                    emit(
                        self.updates.as_ref(),
                        PanelUpdate::Fragment {
                            message_id: session.message_id().clone(),
                            text,
                        },
                    );
                }
                if applied.cancelled {
                    self.finish(SessionStatus::Cancelled, Outcome::Cancelled);
                } else if applied.end_of_stream {
                    self.finish(SessionStatus::Done, Outcome::Completed);
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Undecodable chat stream");
                self.finish(SessionStatus::Errored, Outcome::Failed);
            }
        }
    }

    /// Finalize a live session whose handle was cancelled elsewhere
    fn observe_cancellation(&mut self) -> bool {
        let requested = self
            .session
            .as_ref()
            .is_some_and(StreamSession::is_cancel_requested);
        requested && self.finish(SessionStatus::Cancelled, Outcome::Cancelled)
    }

    /// Terminal transition for the live session, if any
    fn finish(&mut self, status: SessionStatus, outcome: Outcome) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.terminate(status, outcome, &mut self.conversation) {
            return false;
        }

        let message_id = session.message_id().clone();
        let session_id = session.id().clone();
        let text = self
            .conversation
            .get_message(&message_id)
            .map(|m| m.text.clone())
            .unwrap_or_default();

        emit(
            self.updates.as_ref(),
            PanelUpdate::StatusChanged { session_id, status },
        );
        emit(
            self.updates.as_ref(),
            PanelUpdate::Finished {
                message_id,
                status,
                text,
            },
        );
        true
    }

    fn emit(&self, update: PanelUpdate) {
        emit(self.updates.as_ref(), update);
    }
}

fn fresh_conversation(config: &AssistantConfig) -> Conversation {
    let conversation = Conversation::with_limit(config.max_messages);
    match config.greeting {
        Some(ref greeting) => conversation.with_greeting(greeting.clone()),
        None => conversation,
    }
}

fn emit(tx: Option<&mpsc::UnboundedSender<PanelUpdate>>, update: PanelUpdate) {
    if let Some(tx) = tx {
        if tx.send(update).is_err() {
            tracing::trace!("Update receiver dropped");
        }
    }
}

async fn next_chunk(body: &mut ByteStream, idle: Option<Duration>) -> Read {
    let next = match idle {
        Some(limit) => match tokio::time::timeout(limit, body.next()).await {
            Ok(next) => next,
            Err(_) => return Read::Failed(TransportError::IdleTimeout(limit)),
        },
        None => body.next().await,
    };

    match next {
        Some(Ok(chunk)) => Read::Chunk(chunk),
        Some(Err(e)) => Read::Failed(e),
        None => Read::Closed,
    }
}
