//! Chat Backend Integration
//!
//! Abstracted access to the text-generation endpoint through a common trait.
//!
//! # Usage
//!
//! ```ignore
//! use assistant_core::backend::{ChatBackend, ChatRequest, HttpChatBackend};
//!
//! let backend = HttpChatBackend::from_env()?;
//! let body = backend.open_stream(&ChatRequest::new("What's low?")).await?;
//! ```

mod http;
mod traits;

pub use http::HttpChatBackend;
pub use traits::{ByteStream, ChatBackend, ChatRequest};
