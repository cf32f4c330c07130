//! Session module — the connection state machine and top-level contract.
//!
//! # Architecture
//!
//! ```text
//! LiveSession::connect(instruction, callbacks)
//!       │
//!       ├─ AudioBackend::open_capture ──▶ capture pump ──▶ outbound frames
//!       ├─ AudioBackend::open_playback ──▶ SharedScheduler
//!       ├─ LiveTransport::open(setup) ──▶ Connection
//!       │
//!       └─ event loop (tokio task)
//!             Opened / Audio / Interrupted / Closed / Error
//!                        │
//!                        ▼
//!             on_open · on_close · on_error · on_volume
//! ```
//!
//! One `LiveSession` drives one connection attempt at a time; `disconnect`
//! always returns it to `Idle` with every device released.

pub mod live;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use live::{LiveSession, SessionCallbacks, SessionError};
pub use state::ConnectionState;
