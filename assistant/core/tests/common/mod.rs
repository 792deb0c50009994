//! Scripted chat backend for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use assistant_core::{ByteStream, ChatBackend, ChatRequest, TransportError};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::mpsc;

/// Sender half feeding a [`Script::Live`] response body
pub type BodyFeed = mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>;

/// How the backend answers one request
pub enum Script {
    /// Body made of these chunks, then a clean close
    Chunks(Vec<Vec<u8>>),
    /// Body fed by the test through a channel
    Live(mpsc::UnboundedReceiver<Result<Vec<u8>, TransportError>>),
    /// Connection refused
    Refused,
}

/// Answers requests from a queue of scripts
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// A live body and the sender feeding it
pub fn live() -> (Script, BodyFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Script::Live(rx), tx)
}

/// Split `body` at the given byte offsets
pub fn split_at(body: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        chunks.push(body[start..cut].to_vec());
        start = cut;
    }
    chunks.push(body[start..].to_vec());
    chunks
}

/// `data:` line carrying one fragment
pub fn frame(token: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "token": token }))
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no script left for request");

        match script {
            Script::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            Script::Live(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Script::Refused => Err(TransportError::Connect("connection refused".to_string())),
        }
    }
}
