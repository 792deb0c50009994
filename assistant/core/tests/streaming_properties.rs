//! End-to-end behavior of the chat panel against scripted response bodies
//!
//! Covers chunk-boundary independence, the sentinel, malformed frames,
//! cancellation, session replacement and transport failures.

mod common;

use pretty_assertions::assert_eq;

use assistant_core::{
    AssistantConfig, ChatPanel, MessageRole, SessionStatus, TransportError, CANCELLED_NOTICE,
    FAILURE_NOTICE, MAX_LINE_BYTES,
};
use common::{frame, live, split_at, Script, ScriptedBackend};

fn panel(scripts: impl IntoIterator<Item = Script>) -> ChatPanel<ScriptedBackend> {
    ChatPanel::new(ScriptedBackend::new(scripts), AssistantConfig::default())
}

fn last_text(panel: &ChatPanel<ScriptedBackend>) -> String {
    panel
        .conversation()
        .messages()
        .last()
        .map(|m| m.text.clone())
        .unwrap_or_default()
}

async fn assemble(chunks: Vec<Vec<u8>>) -> (SessionStatus, String) {
    let mut panel = panel([Script::Chunks(chunks)]);
    let status = panel.ask("question").await.unwrap();
    (status, last_text(&panel))
}

fn sample_body() -> Vec<u8> {
    let mut body = String::new();
    body.push_str(&frame("Hel"));
    body.push_str(": heartbeat\n\n");
    body.push_str(&frame("lo, "));
    body.push_str(&frame("caf\u{e9} \u{1f37a}"));
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

const SAMPLE_TEXT: &str = "Hello, caf\u{e9} \u{1f37a}";

#[tokio::test]
async fn test_every_single_split_assembles_identically() {
    let body = sample_body();
    for cut in 0..=body.len() {
        let (status, text) = assemble(split_at(&body, &[cut])).await;
        assert_eq!(status, SessionStatus::Done, "cut at {cut}");
        assert_eq!(text, SAMPLE_TEXT, "cut at {cut}");
    }
}

#[tokio::test]
async fn test_every_double_split_assembles_identically() {
    let body = sample_body();
    for first in 1..body.len() {
        for second in first..body.len() {
            let (status, text) = assemble(split_at(&body, &[first, second])).await;
            assert_eq!(status, SessionStatus::Done, "cuts at {first},{second}");
            assert_eq!(text, SAMPLE_TEXT, "cuts at {first},{second}");
        }
    }
}

#[tokio::test]
async fn test_one_byte_at_a_time_and_all_at_once() {
    let body = sample_body();

    let bytewise: Vec<Vec<u8>> = body.iter().map(|b| vec![*b]).collect();
    assert_eq!(
        assemble(bytewise).await,
        (SessionStatus::Done, SAMPLE_TEXT.to_string())
    );
    assert_eq!(
        assemble(vec![body]).await,
        (SessionStatus::Done, SAMPLE_TEXT.to_string())
    );
}

#[tokio::test]
async fn test_two_fragments_and_sentinel() {
    let body = format!("{}{}data: [DONE]\n", frame("Hel"), frame("lo"));
    let mut panel = panel([Script::Chunks(vec![body.into_bytes()])]);

    assert_eq!(panel.ask("hi").await.unwrap(), SessionStatus::Done);
    assert_eq!(last_text(&panel), "Hello");
    assert!(!panel.conversation().is_streaming());
    assert_eq!(panel.backend().requests()[0].message, "hi");
}

#[tokio::test]
async fn test_malformed_frame_between_fragments_is_skipped() {
    let body = format!(
        "{}data: {{not json\n{}data: [DONE]\n",
        frame("Hel"),
        frame("lo")
    );
    let mut panel = panel([Script::Chunks(vec![body.into_bytes()])]);

    assert_eq!(panel.ask("hi").await.unwrap(), SessionStatus::Done);
    assert_eq!(last_text(&panel), "Hello");
}

#[tokio::test]
async fn test_frames_after_sentinel_are_ignored() {
    let body = format!("{}data: [DONE]\n{}", frame("Hello"), frame(" again"));
    let mut panel = panel([Script::Chunks(vec![body.into_bytes()])]);

    assert_eq!(panel.ask("hi").await.unwrap(), SessionStatus::Done);
    assert_eq!(last_text(&panel), "Hello");
}

#[tokio::test]
async fn test_cancel_after_two_fragments() {
    let (script, feed) = live();
    let mut panel = panel([script]);
    panel.send("hi").unwrap();

    assert_eq!(panel.pump().await, SessionStatus::Pending);
    feed.send(Ok(format!("{}{}", frame("Hel"), frame("lo")).into_bytes()))
        .unwrap();
    assert_eq!(panel.pump().await, SessionStatus::Streaming);
    assert_eq!(last_text(&panel), "Hello");

    assert!(panel.cancel());
    assert_eq!(panel.status(), SessionStatus::Cancelled);
    assert_eq!(last_text(&panel), CANCELLED_NOTICE);
    assert!(!panel.conversation().is_streaming());

    // The body was released; later frames never reach the conversation
    let _ = feed.send(Ok(format!("{}data: [DONE]\n", frame("!")).into_bytes()));
    assert_eq!(panel.pump().await, SessionStatus::Cancelled);
    assert_eq!(last_text(&panel), CANCELLED_NOTICE);
    assert_eq!(panel.conversation().messages().len(), 2);
}

#[tokio::test]
async fn test_cancel_from_handle_between_chunks() {
    let (script, feed) = live();
    let mut panel = panel([script]);
    let handle = panel.send("hi").unwrap();

    feed.send(Ok(frame("Hel").into_bytes())).unwrap();
    panel.pump().await;
    panel.pump().await;
    assert_eq!(last_text(&panel), "Hel");

    handle.cancel();
    feed.send(Ok(format!("{}data: [DONE]\n", frame("lo")).into_bytes()))
        .unwrap();

    assert_eq!(panel.run().await, SessionStatus::Cancelled);
    assert_eq!(last_text(&panel), CANCELLED_NOTICE);
}

#[tokio::test]
async fn test_new_session_cancels_prior() {
    let (first, feed) = live();
    let second = Script::Chunks(vec![format!("{}data: [DONE]\n", frame("Second answer")).into_bytes()]);
    let mut panel = panel([first, second]);

    let first_handle = panel.send("first").unwrap();
    panel.pump().await;
    feed.send(Ok(frame("A").into_bytes())).unwrap();
    assert_eq!(panel.pump().await, SessionStatus::Streaming);

    let second_handle = panel.send("second").unwrap();
    assert!(first_handle.is_cancelled());
    assert!(!second_handle.is_cancelled());
    assert_ne!(first_handle.id(), second_handle.id());

    // Bytes still in flight for the first session go nowhere
    let _ = feed.send(Ok(frame("B").into_bytes()));
    assert_eq!(panel.run().await, SessionStatus::Done);

    let view: Vec<_> = panel
        .conversation()
        .messages()
        .iter()
        .map(|m| (m.role, m.text.as_str()))
        .collect();
    assert_eq!(
        view,
        vec![
            (MessageRole::User, "first"),
            (MessageRole::Assistant, CANCELLED_NOTICE),
            (MessageRole::User, "second"),
            (MessageRole::Assistant, "Second answer"),
        ]
    );

    let requests: Vec<_> = panel
        .backend()
        .requests()
        .into_iter()
        .map(|r| r.message)
        .collect();
    assert_eq!(requests, vec!["first", "second"]);
}

#[tokio::test]
async fn test_connection_refused_leaves_one_notice() {
    let mut panel = panel([Script::Refused]);

    assert_eq!(panel.ask("hi").await.unwrap(), SessionStatus::Errored);

    let view: Vec<_> = panel
        .conversation()
        .messages()
        .iter()
        .map(|m| (m.role, m.text.as_str(), m.streaming))
        .collect();
    assert_eq!(
        view,
        vec![
            (MessageRole::User, "hi", false),
            (MessageRole::Assistant, FAILURE_NOTICE, false),
        ]
    );
}

#[tokio::test]
async fn test_body_error_mid_stream() {
    let (script, feed) = live();
    let mut panel = panel([script]);
    panel.send("hi").unwrap();

    feed.send(Ok(frame("partial").into_bytes())).unwrap();
    feed.send(Err(TransportError::Body("connection reset".to_string())))
        .unwrap();

    assert_eq!(panel.run().await, SessionStatus::Errored);
    // Partial text is replaced, never shown truncated
    assert_eq!(last_text(&panel), FAILURE_NOTICE);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let (script, _feed) = live();
    let mut panel = panel([script]);
    panel.send("hi").unwrap();
    panel.pump().await;

    assert!(panel.cancel());
    let before = panel.snapshot();
    assert!(!panel.cancel());
    assert_eq!(panel.snapshot(), before);
    assert_eq!(panel.status(), SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_after_done_has_no_effect() {
    let body = format!("{}data: [DONE]\n", frame("Hello"));
    let mut panel = panel([Script::Chunks(vec![body.into_bytes()])]);
    let handle = panel.send("hi").unwrap();
    panel.run().await;

    assert!(!panel.cancel());
    handle.cancel();
    assert_eq!(panel.pump().await, SessionStatus::Done);
    assert_eq!(panel.status(), SessionStatus::Done);
    assert_eq!(last_text(&panel), "Hello");
}

#[tokio::test]
async fn test_cancel_without_session() {
    let mut panel = panel([]);
    assert!(!panel.cancel());
    assert_eq!(panel.status(), SessionStatus::Idle);
    assert_eq!(panel.pump().await, SessionStatus::Idle);
}

#[tokio::test]
async fn test_oversized_line_errors() {
    let (script, feed) = live();
    let mut panel = panel([script]);
    panel.send("hi").unwrap();

    feed.send(Ok(vec![b'x'; MAX_LINE_BYTES + 1])).unwrap();
    assert_eq!(panel.run().await, SessionStatus::Errored);
    assert_eq!(last_text(&panel), FAILURE_NOTICE);
}

#[tokio::test]
async fn test_idle_timeout_when_configured() {
    let (script, _feed) = live();
    let config = AssistantConfig {
        idle_timeout_secs: 1,
        ..Default::default()
    };
    let mut panel = ChatPanel::new(ScriptedBackend::new([script]), config);
    panel.send("hi").unwrap();

    assert_eq!(panel.run().await, SessionStatus::Errored);
    assert_eq!(last_text(&panel), FAILURE_NOTICE);
}

#[tokio::test]
async fn test_handle_cancel_then_clear_without_pumping() {
    let (script, feed) = live();
    let mut panel = panel([script]);
    let handle = panel.send("hi").unwrap();

    panel.pump().await;
    feed.send(Ok(frame("Hel").into_bytes())).unwrap();
    assert_eq!(panel.pump().await, SessionStatus::Streaming);

    handle.cancel();
    assert_eq!(panel.status(), SessionStatus::Cancelled);

    panel.clear().unwrap();
    let snapshot = panel.snapshot();
    assert!(!snapshot.streaming);
    assert!(snapshot.messages.is_empty());
    assert_eq!(panel.status(), SessionStatus::Idle);

    // The body was released when the session was finalized
    assert!(feed.send(Ok(frame("lo").into_bytes())).is_err());
}
