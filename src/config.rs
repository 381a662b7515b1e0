//! Configuration types for a conversation session.
//!
//! All values are immutable after construction: the loop never mutates its
//! config, and every struct carries serde defaults so partial TOML files work.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for one conversation session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Audio capture/playback settings.
    pub audio: AudioConfig,
    /// Speech endpoint detection settings.
    pub endpoint: EndpointConfig,
    /// Conversation loop settings.
    pub conversation: ConversationConfig,
    /// Speech-to-text adapter settings.
    pub stt: SttConfig,
    /// Response backend settings.
    pub llm: LlmConfig,
    /// Speech output adapter settings.
    pub tts: TtsConfig,
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz. Frames and utterance clips use this rate.
    pub sample_rate: u32,
    /// Duration of one analysis frame in milliseconds.
    pub frame_duration_ms: u32,
    /// Frames discarded after the capture stream opens (device warm-up skew).
    pub pre_roll_frames: usize,
    /// Playback sample rate in Hz for synthesized replies.
    pub output_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
    /// Well-known slot file for the current utterance clip, overwritten each
    /// cycle. None disables the on-disk copy.
    pub clip_path: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_duration_ms: 30,
            pre_roll_frames: 10,
            output_sample_rate: 24_000,
            input_device: None,
            output_device: None,
            clip_path: Some(std::env::temp_dir().join("sotto-utterance.wav")),
        }
    }
}

impl AudioConfig {
    /// Number of samples in one analysis frame.
    #[must_use]
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize) / 1000
    }
}

/// Speech endpoint detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// RMS energy threshold for the speech/non-speech classification.
    ///
    /// Frames with RMS above this value are classified as speech.
    /// Typical values for f32 samples in \[-1, 1\]:
    ///   - 0.005: very sensitive (picks up quiet speech and some noise)
    ///   - 0.01:  normal sensitivity (default, good for most environments)
    ///   - 0.02:  reduced sensitivity (noisy environments)
    ///   - 0.05:  low sensitivity (only loud/close speech)
    pub energy_threshold: f32,
    /// Capacity of the hangover window (trailing classifications examined
    /// while triggered). 40 frames at 30ms covers 1.2s of trailing context.
    pub hangover_window_frames: usize,
    /// Fraction of non-speech frames in the full hangover window that ends
    /// the utterance. Lower values cut earlier; 0.8–0.9 are the useful range.
    pub silence_ratio: f32,
    /// Minimum utterance length in frames. Shorter detections are treated as
    /// noise and discarded without reaching transcription.
    pub min_utterance_frames: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            hangover_window_frames: 40,
            silence_ratio: 0.9,
            min_utterance_frames: 15,
        }
    }
}

/// Conversation loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Sleep between cycles when nothing was captured or a cycle failed, in ms.
    pub backoff_ms: u64,
    /// Minimum transcript length in characters; shorter transcripts are
    /// discarded as noise.
    pub min_transcript_chars: usize,
    /// System prompt seeding the dialogue history.
    pub system_prompt: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 750,
            min_transcript_chars: 2,
            system_prompt: "You are a helpful voice assistant. Keep replies short and conversational.".to_owned(),
        }
    }
}

/// Speech-to-text adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL of the OpenAI-compatible transcription endpoint.
    pub api_url: String,
    /// Model name to request.
    pub model: String,
    /// Optional language hint (ISO 639-1).
    pub language: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "whisper-1".to_owned(),
            language: None,
        }
    }
}

/// Response backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible chat completions endpoint.
    pub api_url: String,
    /// Model name to request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: usize,
    /// Sampling temperature (0.0 = greedy, higher = more random).
    pub temperature: f64,
    /// Top-p (nucleus) sampling threshold.
    pub top_p: f64,
    /// Request deadline in seconds for one backend call.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            max_tokens: 200,
            temperature: 0.7,
            top_p: 0.9,
            request_timeout_secs: 30,
        }
    }
}

/// Speech output adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Whether replies are spoken aloud (they are always printed).
    pub enabled: bool,
    /// Base URL of the OpenAI-compatible speech endpoint.
    pub api_url: String,
    /// Model name to request.
    pub model: String,
    /// Voice name to request.
    pub voice: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://api.openai.com".to_owned(),
            model: "tts-1".to_owned(),
            voice: "alloy".to_owned(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::SottoError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SottoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/sotto/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("sotto").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("sotto")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/sotto-config/config.toml")
        }
    }
}
