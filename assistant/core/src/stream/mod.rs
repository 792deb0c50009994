//! Streaming Response Framing
//!
//! Converts the raw body of a streaming chat response into typed events.
//!
//! # Pipeline
//!
//! ```text
//!   body chunks ──push()──▶ LineDecoder ──next_line()──▶ FrameParser ──▶ FrameEvent
//!   (any split)             (buffers partial lines)      (JSON/sentinel)
//! ```
//!
//! Both stages are synchronous and allocation-light; the async side lives in
//! [`crate::panel`].

mod decoder;
mod parser;

pub use decoder::{DecodeError, LineDecoder, MAX_LINE_BYTES};
pub use parser::{FrameEvent, FrameParser};
