//! Conversation State
//!
//! Ordered list of user and assistant messages for one chat panel.
//!
//! # Design Philosophy
//!
//! Messages are append-only. At most one assistant message is "in progress"
//! at a time; it is the only message whose text may change, and it only
//! changes through [`Conversation::append_fragment`] and
//! [`Conversation::finalize_in_progress`]. Everything a rendering layer needs
//! is available through [`Conversation::snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::messages::{ConversationId, MessageId, MessageRole};

/// Notice shown in place of an answer that failed to arrive
pub const FAILURE_NOTICE: &str = "\u{26a0}\u{fe0f} Could not reach the assistant. Please try again.";

/// Notice shown in place of an answer the user cancelled
pub const CANCELLED_NOTICE: &str = "\u{26a0}\u{fe0f} Response cancelled.";

/// A message in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message text
    pub text: String,
    /// When the message was appended
    pub created_at: DateTime<Utc>,
    /// Whether the message is still receiving fragments
    pub streaming: bool,
}

impl Message {
    fn new(role: MessageRole, text: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            text,
            created_at: Utc::now(),
            streaming: false,
        }
    }

    fn streaming(role: MessageRole) -> Self {
        Self {
            streaming: true,
            ..Self::new(role, String::new())
        }
    }
}

/// How an in-progress message ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Keep the assembled text
    Completed,
    /// Replace the text with [`FAILURE_NOTICE`]
    Failed,
    /// Replace the text with [`CANCELLED_NOTICE`]
    Cancelled,
}

/// Message as seen by a rendering layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    /// Who sent this message
    pub role: MessageRole,
    /// Message text so far
    pub text: String,
    /// When the message was appended
    pub created_at: DateTime<Utc>,
    /// Show a typing caret
    pub streaming: bool,
}

/// Read-only view of a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    /// Conversation this snapshot belongs to
    pub id: ConversationId,
    /// Messages in arrival order
    pub messages: Vec<SnapshotMessage>,
    /// Whether an assistant message is in progress
    pub streaming: bool,
}

/// Ordered conversation with at most one in-progress assistant message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    messages: Vec<Message>,
    /// Currently streaming message (if any)
    in_progress: Option<MessageId>,
    /// Maximum number of messages to keep (0 = unlimited)
    #[serde(default)]
    max_messages: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(0)
    }

    /// Create a conversation that keeps at most `max_messages` (0 = unlimited)
    #[must_use]
    pub fn with_limit(max_messages: usize) -> Self {
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            in_progress: None,
            max_messages,
        }
    }

    /// Seed a welcome message from the assistant
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.messages
            .push(Message::new(MessageRole::Assistant, greeting.into()));
        self
    }

    /// Conversation ID
    #[must_use]
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Append an immutable user message
    ///
    /// # Errors
    ///
    /// [`AssistantError::Validation`] if `text` is empty after trimming.
    pub fn append_user_message(&mut self, text: &str) -> Result<MessageId, AssistantError> {
        if text.trim().is_empty() {
            return Err(AssistantError::Validation(
                "message must not be empty".to_string(),
            ));
        }

        let msg = Message::new(MessageRole::User, text.to_string());
        let id = msg.id.clone();
        self.messages.push(msg);
        self.prune_if_needed();
        Ok(id)
    }

    /// Append an empty assistant message and mark it in progress
    ///
    /// # Errors
    ///
    /// [`AssistantError::InvalidState`] if another message is in progress.
    pub fn begin_assistant_message(&mut self) -> Result<MessageId, AssistantError> {
        if let Some(ref current) = self.in_progress {
            return Err(AssistantError::InvalidState(format!(
                "message {current} is already in progress"
            )));
        }

        let msg = Message::streaming(MessageRole::Assistant);
        let id = msg.id.clone();
        self.in_progress = Some(id.clone());
        self.messages.push(msg);
        self.prune_if_needed();
        Ok(id)
    }

    /// Append a fragment to the in-progress message
    ///
    /// Returns `false` without changing anything when no message is in
    /// progress; a cancellation may legitimately race the last fragment.
    pub fn append_fragment(&mut self, text: &str) -> bool {
        match self.in_progress_mut() {
            Some(msg) => {
                msg.text.push_str(text);
                true
            }
            None => {
                tracing::trace!(len = text.len(), "Dropping fragment with no message in progress");
                false
            }
        }
    }

    /// Finish the in-progress message
    ///
    /// Returns the finalized message ID, or `None` if nothing was in progress.
    pub fn finalize_in_progress(&mut self, outcome: Outcome) -> Option<MessageId> {
        let msg = self.in_progress_mut()?;
        msg.streaming = false;
        match outcome {
            Outcome::Completed => {}
            Outcome::Failed => msg.text = FAILURE_NOTICE.to_string(),
            Outcome::Cancelled => msg.text = CANCELLED_NOTICE.to_string(),
        }
        let id = msg.id.clone();
        self.in_progress = None;
        self.prune_if_needed();
        Some(id)
    }

    /// The in-progress message, if any
    #[must_use]
    pub fn in_progress(&self) -> Option<&Message> {
        let id = self.in_progress.as_ref()?;
        self.messages.iter().rev().find(|m| &m.id == id)
    }

    fn in_progress_mut(&mut self) -> Option<&mut Message> {
        let id = self.in_progress.as_ref()?;
        self.messages.iter_mut().rev().find(|m| &m.id == id)
    }

    /// Whether an assistant message is in progress
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.in_progress.is_some()
    }

    /// All messages in arrival order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get message by ID
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Number of user messages sent so far
    #[must_use]
    pub fn user_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
    }

    /// Rendering view of the conversation
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            id: self.id,
            messages: self
                .messages
                .iter()
                .map(|m| SnapshotMessage {
                    role: m.role,
                    text: m.text.clone(),
                    created_at: m.created_at,
                    streaming: m.streaming,
                })
                .collect(),
            streaming: self.is_streaming(),
        }
    }

    /// Clear message history
    ///
    /// # Errors
    ///
    /// [`AssistantError::InvalidState`] while a message is in progress.
    pub fn clear(&mut self) -> Result<(), AssistantError> {
        if self.is_streaming() {
            return Err(AssistantError::InvalidState(
                "cannot clear while a response is streaming".to_string(),
            ));
        }
        self.messages.clear();
        Ok(())
    }

    /// Drop the oldest messages (never the in-progress one) beyond the limit
    fn prune_if_needed(&mut self) {
        if self.max_messages == 0 || self.messages.len() <= self.max_messages {
            return;
        }

        let mut excess = self.messages.len() - self.max_messages;
        let in_progress = self.in_progress.clone();
        self.messages.retain(|msg| {
            if excess == 0 || Some(&msg.id) == in_progress.as_ref() {
                return true;
            }
            excess -= 1;
            false
        });

        tracing::debug!(
            remaining = self.messages.len(),
            limit = self.max_messages,
            "Pruned conversation messages"
        );
    }
}
