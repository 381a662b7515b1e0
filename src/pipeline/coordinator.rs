//! The conversation orchestrator.
//!
//! Drives one session indefinitely: capture one utterance via the endpoint
//! detector, transcribe it, update the dialogue history, request a response,
//! render it, repeat. All stages run strictly sequentially within one cycle —
//! one microphone stream, one history, no overlapping utterances. The
//! response fallback policy is state-dependent, not exception-driven: missing
//! credentials, quota exhaustion, and backend failures each yield a
//! user-visible notice and the loop continues. Only an external interrupt
//! stops the session.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::history::DialogueHistory;
use crate::llm::{BackendError, ChatBackend};
use crate::pipeline::messages::Frame;
use crate::stt::Transcriber;
use crate::tts::SpeechOutput;
use crate::utterance::UtteranceBuffer;
use crate::vad::EndpointDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Buffer size for the capture-to-detector frame channel.
pub const FRAME_CHANNEL_SIZE: usize = 64;

/// Fixed reply when no credentials are configured for the response backend.
pub const OFFLINE_NOTICE: &str =
    "Offline mode: no API credentials are configured, so I can't reach the response backend.";

/// Fixed reply when the response backend reports quota exhaustion.
pub const QUOTA_NOTICE: &str =
    "The response backend reports insufficient quota; switching to offline mode.";

/// What one conversation cycle produced.
enum CycleOutcome {
    /// A reply was rendered; move straight to the next cycle.
    Replied,
    /// Nothing usable was captured (empty clip, failed or too-short
    /// transcript); back off briefly before listening again.
    NothingCaptured,
}

/// One conversation session: detector, history, and the three adapters.
///
/// Exclusively owns its [`DialogueHistory`]; concurrent sessions would each
/// need their own loop, detector, and history — there is no shared state.
pub struct ConversationLoop {
    config: SessionConfig,
    detector: EndpointDetector,
    history: DialogueHistory,
    stt: Arc<dyn Transcriber>,
    backend: Arc<dyn ChatBackend>,
    voice: Option<Arc<dyn SpeechOutput>>,
    has_credentials: bool,
    cancel: CancellationToken,
}

impl ConversationLoop {
    /// Create a session over the given adapters.
    ///
    /// `has_credentials` gates the response backend: when `false` the
    /// backend is never contacted and every cycle replies with the offline
    /// notice.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        stt: Arc<dyn Transcriber>,
        backend: Arc<dyn ChatBackend>,
        voice: Option<Arc<dyn SpeechOutput>>,
        has_credentials: bool,
    ) -> Self {
        let detector = EndpointDetector::new(&config.endpoint);
        let history = DialogueHistory::new(&config.conversation.system_prompt);
        Self {
            config,
            detector,
            history,
            stt,
            backend,
            voice,
            has_credentials,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled (e.g. from a Ctrl+C handler).
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The session transcript.
    #[must_use]
    pub fn history(&self) -> &DialogueHistory {
        &self.history
    }

    /// Run the conversation until cancelled or the frame source closes.
    ///
    /// The loop exits cleanly after the current iteration on cancellation;
    /// no partially written turn is left dangling because the assistant turn
    /// for a cycle is appended in the same iteration as its user turn.
    ///
    /// # Errors
    ///
    /// Only genuinely unrecoverable pipeline errors surface here; per-cycle
    /// failures are logged and absorbed.
    pub async fn run(&mut self, mut frames: mpsc::Receiver<Frame>) -> Result<()> {
        info!("conversation loop started");

        loop {
            let Some(utterance) = self.capture_utterance(&mut frames).await else {
                break;
            };

            match self.run_cycle(utterance).await {
                Ok(CycleOutcome::Replied) => {}
                Ok(CycleOutcome::NothingCaptured) => self.backoff().await,
                Err(e) => {
                    error!("conversation cycle failed: {e}");
                    self.backoff().await;
                }
            }
        }

        info!(
            turns = self.history.len(),
            "conversation loop stopped"
        );
        Ok(())
    }

    /// Feed frames to the detector until an utterance completes.
    ///
    /// Returns `None` on cancellation or when the frame source closes.
    async fn capture_utterance(
        &mut self,
        frames: &mut mpsc::Receiver<Frame>,
    ) -> Option<UtteranceBuffer> {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("capture interrupted by cancellation");
                    return None;
                }
                frame = frames.recv() => {
                    let frame = frame?;
                    if let Some(utterance) = self.detector.push_frame(frame) {
                        return Some(utterance);
                    }
                }
            }
        }
    }

    /// One full cycle: finalize, transcribe, respond, render.
    async fn run_cycle(&mut self, utterance: UtteranceBuffer) -> Result<CycleOutcome> {
        let Some(clip) = utterance.finalize()? else {
            return Ok(CycleOutcome::NothingCaptured);
        };

        // The slot file is transient and overwritten every cycle; a failed
        // write must not cost us the cycle.
        if let Some(ref path) = self.config.audio.clip_path
            && let Err(e) = clip.write_to(path)
        {
            warn!("failed to write utterance slot file: {e}");
        }

        let transcription = match self.stt.transcribe(&clip).await {
            Ok(t) => t,
            Err(e) => {
                warn!("transcription failed, treating as nothing captured: {e}");
                return Ok(CycleOutcome::NothingCaptured);
            }
        };

        let text = transcription.text.trim().to_owned();
        if text.chars().count() < self.config.conversation.min_transcript_chars {
            debug!("discarding empty/too-short transcript");
            return Ok(CycleOutcome::NothingCaptured);
        }

        println!("You: {text}");
        self.history.push_user(&text);

        let reply = self.respond().await;
        self.history.push_assistant(&reply);
        println!("Assistant: {reply}");

        if let Some(ref voice) = self.voice
            && let Err(e) = voice.speak(&reply).await
        {
            // Speech output failure is logged and swallowed, never fatal.
            warn!("speech output failed: {e}");
        }

        Ok(CycleOutcome::Replied)
    }

    /// The state-dependent response fallback policy.
    ///
    /// Every branch produces reply text; none of them can end the loop.
    async fn respond(&self) -> String {
        if !self.has_credentials {
            info!("no backend credentials, replying with offline notice");
            return OFFLINE_NOTICE.to_owned();
        }

        match self.backend.complete(self.history.turns()).await {
            Ok(text) => text,
            Err(BackendError::Quota) => {
                warn!("response backend quota exhausted");
                QUOTA_NOTICE.to_owned()
            }
            Err(BackendError::Other(msg)) => {
                warn!("response backend failed: {msg}");
                format!("The response backend failed: {msg}")
            }
        }
    }

    /// Sleep between cycles, waking early on cancellation.
    async fn backoff(&self) {
        let delay = Duration::from_millis(self.config.conversation.backoff_ms);
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }
}
