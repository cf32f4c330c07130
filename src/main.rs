//! Application entry point — live voice session demo.
//!
//! A thin stand-in for the dashboard that normally drives the session: it
//! loads configuration, resolves the system instruction and the credential,
//! runs one session until Ctrl-C, and logs the status callbacks.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Resolve the credential (`api_key` in settings, or `GEMINI_API_KEY`).
//! 4. Create the tokio runtime.
//! 5. Build the WebSocket transport and cpal backend, connect the session.
//! 6. Wait for Ctrl-C, then disconnect cleanly.

use std::sync::Arc;

use voice_live::{
    audio::CpalBackend,
    config::AppConfig,
    session::{LiveSession, SessionCallbacks},
    transport::WsTransport,
};

/// Instruction used when the config names no instruction file.
const DEFAULT_INSTRUCTION: &str =
    "You are a concise, friendly customer-support voice agent. Answer in short \
     spoken sentences and ask one clarifying question at a time.";

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-live starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Credential: settings first, environment as fallback.
    if config.api_key.as_deref().map_or(true, str::is_empty) {
        config.api_key = std::env::var("GEMINI_API_KEY").ok();
    }

    // 4. Tokio runtime (2 workers — transport I/O and the event loop)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    rt.block_on(run(config))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    // System instruction: file from config, or the built-in default.
    let instruction = match &config.session.instruction_file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read instruction file {path:?}: {e}"))?,
        None => DEFAULT_INSTRUCTION.to_string(),
    };

    let transport = Arc::new(WsTransport::from_config(&config.transport));
    let backend = Arc::new(CpalBackend);
    let mut session = LiveSession::new(&config, transport, backend);

    let callbacks = SessionCallbacks {
        on_open: Box::new(|| log::info!("connected — speak into the microphone")),
        on_close: Box::new(|| log::info!("remote service closed the session")),
        on_error: Box::new(|detail| log::error!("session error: {detail}")),
        on_volume: Box::new(|level| log::trace!("agent output level: {level:.2}")),
    };

    session.connect(&instruction, callbacks).await?;

    tokio::signal::ctrl_c().await?;
    log::info!("Ctrl-C received, shutting down");
    session.disconnect().await;

    Ok(())
}
