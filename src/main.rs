//! Single long-running entry point for the voice conversation loop.
//!
//! No subcommands, no flags: configuration comes from the default TOML path
//! when present, credentials from the environment. Terminates on Ctrl+C.

use sotto::audio::capture::FrameCapture;
use sotto::llm::OpenAiChat;
use sotto::pipeline::coordinator::FRAME_CHANNEL_SIZE;
use sotto::stt::WhisperApi;
use sotto::tts::{ApiTts, SpeechOutput};
use sotto::{ConversationLoop, SessionConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — suppress noisy dependency logs by default.
    // Users can override with RUST_LOG=debug to see everything.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sotto=info,reqwest=warn,cpal=warn")),
        )
        .init();

    let config_path = SessionConfig::default_config_path();
    let config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        SessionConfig::from_file(&config_path)?
    } else {
        SessionConfig::default()
    };

    let api_key = std::env::var(&config.llm.api_key_env).unwrap_or_default();
    let has_credentials = !api_key.trim().is_empty();
    if !has_credentials {
        warn!(
            "{} is not set — running in offline mode",
            config.llm.api_key_env
        );
    }

    let stt = Arc::new(WhisperApi::new(&config.stt, api_key.clone()));
    let backend = Arc::new(OpenAiChat::new(&config.llm, api_key.clone())?);
    let voice: Option<Arc<dyn SpeechOutput>> = if config.tts.enabled && has_credentials {
        Some(Arc::new(ApiTts::new(&config.tts, &config.audio, api_key)))
    } else {
        None
    };

    // Opening the audio device is the only startup step allowed to be fatal.
    let capture = FrameCapture::new(&config.audio)?;

    let mut session = ConversationLoop::new(config, stt, backend, voice, has_credentials);
    let cancel = session.cancel_token();

    // Handle Ctrl+C: stop accepting new cycles, exit after the current one.
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    println!("sotto v{}", env!("CARGO_PKG_VERSION"));
    println!("\nReady! Speak into your microphone. Press Ctrl+C to stop.\n");

    let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_SIZE);
    let capture_cancel = cancel.clone();
    let capture_task = tokio::spawn(async move { capture.run(frame_tx, capture_cancel).await });

    session.run(frame_rx).await?;

    cancel.cancel();
    match capture_task.await {
        Ok(result) => result?,
        Err(e) => warn!("capture task did not shut down cleanly: {e}"),
    }

    Ok(())
}
