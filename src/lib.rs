//! Real-time voice session client for a conversational speech service.
//!
//! Opens a bidirectional audio channel to a remote agent: microphone audio
//! is captured, framed and streamed out continuously, while inbound audio
//! chunks are decoded and played back gaplessly with sample-accurate
//! scheduling — including immediate cancellation when the user barges in
//! over the agent.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal → capture pump → base64 PCM frames → WebSocket
//!                                                            │
//! Speaker ← cpal ← PlaybackScheduler ← decode/resample ← server chunks
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_live::audio::CpalBackend;
//! use voice_live::config::AppConfig;
//! use voice_live::session::{LiveSession, SessionCallbacks};
//! use voice_live::transport::WsTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap();
//!     let transport = Arc::new(WsTransport::from_config(&config.transport));
//!     let backend = Arc::new(CpalBackend);
//!
//!     let mut session = LiveSession::new(&config, transport, backend);
//!     session
//!         .connect("You are a helpful voice agent.", SessionCallbacks::default())
//!         .await
//!         .unwrap();
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!     session.disconnect().await;
//! }
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod playback;
pub mod session;
pub mod transport;
