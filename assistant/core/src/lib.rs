//! Assistant Core - Streaming Chat Panel Engine
//!
//! This crate implements the assistant panel of the lounge inventory
//! dashboard: it sends a staff question to the text-generation endpoint,
//! consumes the server-sent token stream, and assembles the answer into a
//! conversation in real time. It has no UI dependencies; a surface renders
//! [`ConversationSnapshot`]s or listens for [`PanelUpdate`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          ChatPanel                            │
//! │  send() / pump() / cancel()                                   │
//! │                                                               │
//! │  ChatBackend ──bytes──▶ LineDecoder ──lines──▶ FrameParser    │
//! │  (HTTP)                                           │           │
//! │                                              FrameEvent       │
//! │                                                   ▼           │
//! │  StreamSession (status, abort handle) ──▶ Conversation        │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 │ snapshot() / PanelUpdate
//!                                 ▼
//!                          Rendering surface
//! ```
//!
//! # Key Types
//!
//! - [`ChatPanel`]: Stream session controller for one conversation
//! - [`Conversation`]: Ordered messages with one in-progress answer
//! - [`LineDecoder`] / [`FrameParser`]: Wire framing
//! - [`ChatBackend`]: Seam over the text-generation endpoint
//! - [`AssistantConfig`]: Endpoint, wire literals and limits
//!
//! # Module Overview
//!
//! - [`backend`]: Chat backend trait and HTTP implementation
//! - [`config`]: Configuration loading
//! - [`conversation`]: Conversation state
//! - [`error`]: Error taxonomy
//! - [`messages`]: Identifiers and status enums
//! - [`panel`]: Stream session controller
//! - [`session`]: Per-request session state and abort handle
//! - [`stream`]: Line decoder and frame parser

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod messages;
pub mod panel;
pub mod session;
pub mod stream;

// Re-exports for convenience
pub use backend::{ByteStream, ChatBackend, ChatRequest, HttpChatBackend};
pub use config::{
    default_config_path, load_config, load_config_from_path, AssistantConfig, ConfigError,
    ConfigSource, WireFormat,
};
pub use conversation::{
    Conversation, ConversationSnapshot, Message, Outcome, SnapshotMessage, CANCELLED_NOTICE,
    FAILURE_NOTICE,
};
pub use error::{AssistantError, TransportError};
pub use messages::{ConversationId, MessageId, MessageRole, SessionId, SessionStatus};
pub use panel::{ChatPanel, PanelUpdate};
pub use session::SessionHandle;
pub use stream::{DecodeError, FrameEvent, FrameParser, LineDecoder, MAX_LINE_BYTES};
