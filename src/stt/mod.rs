//! Speech-to-text transcription boundary.
//!
//! The orchestrator only requires a [`Transcriber`] that turns a finished
//! utterance clip into text within one cycle, reporting failure distinctly
//! from an empty transcript. The bundled implementation posts the WAV clip
//! to an OpenAI-compatible `audio/transcriptions` endpoint.

use crate::config::SttConfig;
use crate::error::{Result, SottoError};
use crate::pipeline::messages::Transcription;
use crate::utterance::UtteranceClip;
use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

/// Transcription boundary: utterance clip in, text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a finished utterance.
    ///
    /// An empty transcript is a successful result; failures surface as
    /// errors and are recovered at the cycle level by the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if transcription fails.
    async fn transcribe(&self, clip: &UtteranceClip) -> Result<Transcription>;
}

/// Transcriber using an OpenAI-compatible transcription API.
pub struct WhisperApi {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl WhisperApi {
    /// Create a transcriber from config and a resolved API key.
    #[must_use]
    pub fn new(config: &SttConfig, api_key: String) -> Self {
        info!(
            "transcriber configured: {} model={}",
            config.api_url, config.model
        );
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperApi {
    async fn transcribe(&self, clip: &UtteranceClip) -> Result<Transcription> {
        let started = Instant::now();
        info!(
            duration_s = clip.duration.as_secs_f32(),
            frames = clip.frame_count,
            "transcribing utterance clip"
        );

        let part = reqwest::multipart::Part::bytes(clip.wav.clone())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| SottoError::Stt(format!("invalid clip part: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);
        if let Some(ref language) = self.language {
            form = form.text("language", language.clone());
        }

        let base = self.api_url.strip_suffix("/v1").unwrap_or(&self.api_url);
        let url = format!("{}/v1/audio/transcriptions", base.trim_end_matches('/'));

        let mut request = self.http.post(&url).multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SottoError::Stt(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SottoError::Stt(format!(
                "transcription failed: HTTP {status}: {}",
                body.trim()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SottoError::Stt(format!("invalid transcription body: {e}")))?;

        let text = json["text"].as_str().unwrap_or("").trim().to_owned();

        let transcribed_at = Instant::now();
        info!(
            latency_ms = started.elapsed().as_millis() as u64,
            "transcribed: \"{text}\""
        );

        Ok(Transcription {
            text,
            audio_captured_at: clip.started_at,
            transcribed_at,
        })
    }
}
