//! Integration tests for the conversation orchestrator with stub adapters.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use sotto::config::SessionConfig;
use sotto::error::{Result, SottoError};
use sotto::history::Role;
use sotto::llm::{BackendError, ChatBackend};
use sotto::pipeline::messages::{Frame, Transcription};
use sotto::stt::Transcriber;
use sotto::tts::SpeechOutput;
use sotto::utterance::UtteranceClip;
use sotto::{ConversationLoop, Turn, OFFLINE_NOTICE, QUOTA_NOTICE};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;

/// Transcriber stub returning a fixed outcome for every clip.
struct StubTranscriber {
    outcome: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl StubTranscriber {
    fn text(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_owned()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(msg: &str) -> Self {
        Self {
            outcome: Err(msg.to_owned()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, clip: &UtteranceClip) -> Result<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(text) => Ok(Transcription {
                text: text.clone(),
                audio_captured_at: clip.started_at,
                transcribed_at: Instant::now(),
            }),
            Err(msg) => Err(SottoError::Stt(msg.clone())),
        }
    }
}

/// Backend stub counting calls and returning a fixed outcome.
struct StubBackend {
    outcome: std::result::Result<String, BackendError>,
    calls: AtomicUsize,
}

impl StubBackend {
    fn replying(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_owned()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(error: BackendError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for StubBackend {
    async fn complete(&self, _turns: &[Turn]) -> std::result::Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Speech output stub recording spoken text, optionally failing.
struct StubVoice {
    fail: bool,
    spoken: AtomicUsize,
}

#[async_trait]
impl SpeechOutput for StubVoice {
    async fn speak(&self, _text: &str) -> Result<()> {
        self.spoken.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SottoError::Tts("synthesis unavailable".to_owned()));
        }
        Ok(())
    }
}

/// Small detector parameters so a four-frame utterance completes:
/// one speech frame triggers, three silence frames fill the window and
/// 3/4 > 0.5 ends the utterance.
fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.endpoint.hangover_window_frames = 4;
    config.endpoint.silence_ratio = 0.5;
    config.endpoint.min_utterance_frames = 1;
    config.conversation.backoff_ms = 1;
    config.conversation.system_prompt = "test system".to_owned();
    config.audio.clip_path = None;
    config
}

fn speech_frame() -> Frame {
    Frame {
        samples: vec![0.5; 480],
        sample_rate: 16_000,
        captured_at: Instant::now(),
    }
}

fn silence_frame() -> Frame {
    Frame {
        samples: vec![0.0; 480],
        sample_rate: 16_000,
        captured_at: Instant::now(),
    }
}

/// Queue `count` complete utterances worth of frames, then close the source
/// so the loop exits after processing them.
async fn feed_utterances(tx: mpsc::Sender<Frame>, count: usize) {
    for _ in 0..count {
        tx.send(speech_frame()).await.unwrap();
        for _ in 0..3 {
            tx.send(silence_frame()).await.unwrap();
        }
    }
    drop(tx);
}

#[tokio::test]
async fn turns_append_in_strict_cycle_order() {
    let backend = Arc::new(StubBackend::replying("the reply"));
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("hello there")),
        backend.clone(),
        None,
        true,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 3).await;
    session.run(rx).await.unwrap();

    let turns = session.history().turns();
    assert_eq!(turns.len(), 1 + 3 * 2);
    assert_eq!(turns[0].role, Role::System);
    for k in 0..3 {
        let user = &turns[1 + 2 * k];
        let assistant = &turns[2 + 2 * k];
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hello there");
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "the reply");
    }
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn offline_mode_never_contacts_the_backend() {
    let backend = Arc::new(StubBackend::replying("should never be seen"));
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("hello there")),
        backend.clone(),
        None,
        false,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 2).await;
    session.run(rx).await.unwrap();

    assert_eq!(backend.call_count(), 0);
    let turns = session.history().turns();
    assert_eq!(turns[2].content, OFFLINE_NOTICE);
    assert_eq!(turns[4].content, OFFLINE_NOTICE);
}

#[tokio::test]
async fn quota_failure_yields_the_fixed_notice() {
    let backend = Arc::new(StubBackend::failing(BackendError::Quota));
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("hello there")),
        backend,
        None,
        true,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 1).await;
    session.run(rx).await.unwrap();

    let turns = session.history().turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[2].content, QUOTA_NOTICE);
}

#[tokio::test]
async fn backend_error_text_is_surfaced_for_diagnosis() {
    let backend = Arc::new(StubBackend::failing(BackendError::Other(
        "connection refused".to_owned(),
    )));
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("hello there")),
        backend,
        None,
        true,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 1).await;
    session.run(rx).await.unwrap();

    let turns = session.history().turns();
    assert_eq!(turns[2].role, Role::Assistant);
    assert!(turns[2].content.contains("connection refused"));
}

#[tokio::test]
async fn transcription_failure_appends_no_user_turn() {
    let backend = Arc::new(StubBackend::replying("reply"));
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::failing("model crashed")),
        backend.clone(),
        None,
        true,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 2).await;
    session.run(rx).await.unwrap();

    // Only the seed system turn: failed transcription is "nothing captured".
    assert_eq!(session.history().len(), 1);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn short_transcript_is_discarded() {
    let backend = Arc::new(StubBackend::replying("reply"));
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("  ")),
        backend.clone(),
        None,
        true,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 1).await;
    session.run(rx).await.unwrap();

    assert_eq!(session.history().len(), 1);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn speech_output_failure_does_not_end_the_cycle() {
    let voice = Arc::new(StubVoice {
        fail: true,
        spoken: AtomicUsize::new(0),
    });
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("hello there")),
        Arc::new(StubBackend::replying("spoken reply")),
        Some(voice.clone()),
        true,
    );

    let (tx, rx) = mpsc::channel(64);
    feed_utterances(tx, 1).await;
    session.run(rx).await.unwrap();

    // The reply was attempted aloud and still landed in the transcript.
    assert_eq!(voice.spoken.load(Ordering::SeqCst), 1);
    let turns = session.history().turns();
    assert_eq!(turns[2].content, "spoken reply");
}

#[tokio::test]
async fn cancellation_exits_cleanly_with_no_dangling_turn() {
    let mut session = ConversationLoop::new(
        test_config(),
        Arc::new(StubTranscriber::text("hello there")),
        Arc::new(StubBackend::replying("reply")),
        None,
        true,
    );
    let cancel = session.cancel_token();

    // Keep the frame source open with an in-progress utterance so the loop
    // is mid-capture when the interrupt arrives.
    let (tx, rx) = mpsc::channel(64);
    tx.send(speech_frame()).await.unwrap();
    tx.send(speech_frame()).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
    });

    session.run(rx).await.unwrap();
    drop(tx);

    // The partial utterance never became a user turn.
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().turns()[0].role, Role::System);
}
