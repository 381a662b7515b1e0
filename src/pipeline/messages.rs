//! Message types passed between pipeline stages.

use std::time::Instant;

/// One fixed-duration block of mono audio samples from the microphone.
///
/// Frames are immutable once produced; the endpoint detector consumes them
/// one at a time.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Mono f32 samples in \[-1, 1\] at the configured session rate.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp when this frame was captured.
    pub captured_at: Instant,
}

/// A transcription result from the speech-to-text adapter.
///
/// An empty `text` is a valid result (the adapter heard nothing usable) and
/// is distinct from a transcription failure, which surfaces as an error.
#[derive(Debug, Clone)]
pub struct Transcription {
    /// The transcribed text.
    pub text: String,
    /// Time the original audio was captured.
    pub audio_captured_at: Instant,
    /// Time the transcription completed.
    pub transcribed_at: Instant,
}
