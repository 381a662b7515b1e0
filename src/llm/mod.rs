//! Response backend: the language-model side of the conversation.
//!
//! The orchestrator talks to a [`ChatBackend`] trait object so tests can
//! inject stubs. The bundled implementation targets any server implementing
//! the OpenAI chat completions API. Backend failures are classified — quota
//! exhaustion is an expected, frequent outcome with its own variant, not a
//! generic error — and never terminate the caller.

use crate::config::LlmConfig;
use crate::error::{Result, SottoError};
use crate::history::Turn;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::info;

/// A failed response-backend call, classified for the fallback policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The provider reported quota/rate-limit exhaustion (HTTP 429 or an
    /// `insufficient_quota` error body).
    #[error("quota exhausted")]
    Quota,
    /// Any other failure (network, protocol, server error).
    #[error("{0}")]
    Other(String),
}

/// Response backend boundary: dialogue history in, reply text out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Request a reply for the given transcript.
    ///
    /// # Errors
    ///
    /// Returns a classified [`BackendError`]; implementations must never
    /// panic or terminate the process.
    async fn complete(&self, turns: &[Turn]) -> std::result::Result<String, BackendError>;
}

/// Chat backend using an OpenAI-compatible HTTP API.
pub struct OpenAiChat {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f64,
    top_p: f64,
}

impl OpenAiChat {
    /// Create a backend from config and a resolved API key.
    ///
    /// The request deadline from `request_timeout_secs` is applied to every
    /// call so one hung request cannot stall the conversation loop forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SottoError::Llm(format!("failed to build HTTP client: {e}")))?;

        info!(
            "chat backend configured: {} model={}",
            config.api_url, config.model
        );

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, turns: &[Turn]) -> std::result::Result<String, BackendError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "top_p": self.top_p,
        });

        let url = completions_url(&self.api_url);
        let started = Instant::now();

        let mut request = self.http.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Other(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Other(format!("invalid response body: {e}")))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BackendError::Other("response has no message content".to_owned()))?
            .trim()
            .to_owned();

        info!(
            latency_ms = started.elapsed().as_millis() as u64,
            "chat backend replied"
        );
        Ok(content)
    }
}

/// Join the base URL with the chat completions path, tolerating a trailing
/// `/v1` or `/` on the configured base.
fn completions_url(api_url: &str) -> String {
    let base = api_url.strip_suffix("/v1").unwrap_or(api_url);
    let base = base.trim_end_matches('/');
    format!("{base}/v1/chat/completions")
}

/// Classify a non-success HTTP response into a [`BackendError`].
///
/// 429 and `insufficient_quota` bodies are quota exhaustion; everything else
/// carries the status and body text for diagnosis.
fn classify_failure(status: u16, body: &str) -> BackendError {
    if status == 429 || body.contains("insufficient_quota") {
        return BackendError::Quota;
    }
    BackendError::Other(format!("HTTP {status}: {}", body.trim()))
}
