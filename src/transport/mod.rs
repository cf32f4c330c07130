//! Transport layer — the bidirectional channel to the live speech service.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                LiveTransport (trait)                    │
//! │                                                        │
//! │  open(credential, SetupConfig)                         │
//! │        │                                               │
//! │        ▼                                               │
//! │   Connection                                           │
//! │     ├─ outbound: mpsc::Sender<MediaBlob>   (frames →)  │
//! │     └─ events:   mpsc::Receiver<TransportEvent>  (←)   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! [`WsTransport`] is the production WebSocket implementation; tests inject
//! a mock that hands out a pre-wired [`Connection`].  The session never sees
//! sockets — only the channel pair.

pub mod messages;
pub mod ws;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use messages::MediaBlob;
pub use ws::WsTransport;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or speaking to the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote endpoint could not be reached.
    #[error("failed to connect to remote endpoint: {0}")]
    Connect(String),

    /// A wire message could not be encoded.
    #[error("failed to encode wire message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The underlying WebSocket failed mid-session.
    #[error("websocket failure: {0}")]
    WebSocket(String),

    /// The transport is no longer available.
    #[error("transport closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// TransportEvent
// ---------------------------------------------------------------------------

/// Inbound events delivered to the session's event loop.
///
/// `Opened` fires once when the server acknowledges setup; after that any
/// number of `Audio` / `Interrupted` / `TurnComplete` events may arrive in
/// any order, terminated by exactly one `Closed` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Server acknowledged the setup message — the session is live.
    Opened,
    /// One inbound audio chunk (base64 PCM at the wire output rate).
    Audio { data: String },
    /// The server detected user speech over agent speech (barge-in).
    Interrupted,
    /// The model finished a response turn.
    TurnComplete,
    /// The connection closed; `reason` is the close-frame text if present.
    Closed { reason: Option<String> },
    /// The connection failed.
    Error { detail: String },
}

// ---------------------------------------------------------------------------
// SetupConfig / Connection
// ---------------------------------------------------------------------------

/// Configuration bundle sent once when the transport opens.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Remote model/capability selector.
    pub model: String,
    /// Prebuilt voice selector for the audio response.
    pub voice: String,
    /// The system instruction ("policy text") for the remote agent.
    pub system_instruction: String,
}

/// An open bidirectional channel: frames out, events in.
///
/// Dropping `outbound` closes the write side; the transport then shuts the
/// connection down cleanly and the event stream ends with `Closed`.
pub struct Connection {
    pub outbound: mpsc::Sender<MediaBlob>,
    pub events: mpsc::Receiver<TransportEvent>,
}

// ---------------------------------------------------------------------------
// LiveTransport
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to the live speech service.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn LiveTransport>` and called from any task.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Open a connection, send the setup bundle, and return the channel
    /// pair.  The returned connection is in the "connecting" phase until it
    /// emits [`TransportEvent::Opened`].
    async fn open(
        &self,
        credential: &str,
        setup: SetupConfig,
    ) -> Result<Connection, TransportError>;
}

// Compile-time assertion: Box<dyn LiveTransport> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn LiveTransport>) {}
};
