//! Sotto: a voice-driven conversational loop.
//!
//! Captures microphone audio, detects speech boundaries frame by frame with
//! a triggered/hangover endpoint detector, transcribes finished utterances,
//! forwards them to a language-model backend, and speaks the reply back.
//!
//! # Architecture
//!
//! One session is a strictly sequential cycle driven by
//! [`ConversationLoop`]:
//! Microphone → endpoint detector → utterance clip → STT → dialogue history
//! → chat backend → speech output. The transcription, response, and speech
//! adapters are trait objects; degraded conditions (missing credentials,
//! quota exhaustion, transcription failure) become fallback notices rather
//! than crashes.

pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod stt;
pub mod tts;
pub mod utterance;
pub mod vad;

pub use config::SessionConfig;
pub use error::{Result, SottoError};
pub use history::{DialogueHistory, Role, Turn};
pub use pipeline::coordinator::{ConversationLoop, FRAME_CHANNEL_SIZE, OFFLINE_NOTICE, QUOTA_NOTICE};
pub use utterance::{UtteranceBuffer, UtteranceClip};
pub use vad::EndpointDetector;
