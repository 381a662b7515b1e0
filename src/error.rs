//! Error types for the sotto conversation pipeline.

/// Top-level error type for the voice conversation loop.
#[derive(Debug, thiserror::Error)]
pub enum SottoError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Response backend error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SottoError>;
