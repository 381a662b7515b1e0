//! Speech output boundary.
//!
//! Replies are always printed; when a [`SpeechOutput`] is configured they
//! are also spoken. Synthesis/playback failures are logged and swallowed by
//! the orchestrator — they never end a cycle.

use crate::audio::playback::CpalPlayback;
use crate::config::{AudioConfig, TtsConfig};
use crate::error::{Result, SottoError};
use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

/// Speech output boundary: reply text in, audible output out.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis or playback fails; callers treat this
    /// as non-fatal.
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Speech output using an OpenAI-compatible speech API, played through the
/// system output device.
pub struct ApiTts {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    voice: String,
    audio: AudioConfig,
}

impl ApiTts {
    /// Create a speech output from config and a resolved API key.
    #[must_use]
    pub fn new(config: &TtsConfig, audio: &AudioConfig, api_key: String) -> Self {
        info!(
            "speech output configured: {} model={} voice={}",
            config.api_url, config.model, config.voice
        );
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            voice: config.voice.clone(),
            audio: audio.clone(),
        }
    }
}

#[async_trait]
impl SpeechOutput for ApiTts {
    async fn speak(&self, text: &str) -> Result<()> {
        let started = Instant::now();

        let base = self.api_url.strip_suffix("/v1").unwrap_or(&self.api_url);
        let url = format!("{}/v1/audio/speech", base.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
            "response_format": "pcm",
        });

        let mut request = self.http.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SottoError::Tts(format!("speech request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SottoError::Tts(format!(
                "speech synthesis failed: HTTP {status}: {}",
                body.trim()
            )));
        }

        let pcm = response
            .bytes()
            .await
            .map_err(|e| SottoError::Tts(format!("failed to read speech body: {e}")))?;
        let samples = pcm_s16le_to_f32(&pcm);

        info!(
            latency_ms = started.elapsed().as_millis() as u64,
            samples = samples.len(),
            "synthesized reply, playing"
        );

        // Playback is blocking; the cpal stream is created and dropped inside
        // the blocking task so the async loop is never stalled.
        let audio = self.audio.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut playback = CpalPlayback::new(&audio)?;
            playback.play(&samples)
        })
        .await
        .map_err(|e| SottoError::Tts(format!("playback task panicked: {e}")))??;

        Ok(())
    }
}

/// Decode little-endian signed 16-bit PCM into f32 samples in \[-1, 1\].
fn pcm_s16le_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|pair| {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            f32::from(value) / f32::from(i16::MAX)
        })
        .collect()
}
