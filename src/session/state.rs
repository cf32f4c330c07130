//! Connection state machine for the live session.
//!
//! [`ConnectionState`] tracks one connection attempt end to end.  The
//! session mutates it from `connect`/`disconnect` and the transport event
//! loop; callers read a snapshot via
//! [`LiveSession::state`](super::LiveSession::state).

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// States of one live-session connection attempt.
///
/// The transitions are:
///
/// ```text
/// Idle ──connect──▶ Connecting ──transport open──▶ Active
///                       │                            │
///                       └────── transport error ─────┴──▶ Error
///
/// Active / Connecting ──transport close──▶ Idle
/// any state ──disconnect──▶ Closing ──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; `connect` is valid only from here.
    Idle,

    /// Devices and transport are open; waiting for the server's setup
    /// acknowledgement.  Captured frames buffer until `Active`.
    Connecting,

    /// Fully live — frames streaming out, chunks playing back.
    Active,

    /// `disconnect` is tearing resources down.
    Closing,

    /// The transport failed; resources have been released.  Terminal —
    /// reconnecting starts a fresh attempt from `Idle`.
    Error,
}

impl ConnectionState {
    /// Returns `true` while a connection attempt is underway or live.
    ///
    /// `connect` rejects in these states.
    ///
    /// ```
    /// use voice_live::session::ConnectionState;
    ///
    /// assert!(!ConnectionState::Idle.is_live());
    /// assert!(ConnectionState::Connecting.is_live());
    /// assert!(ConnectionState::Active.is_live());
    /// assert!(!ConnectionState::Closing.is_live());
    /// assert!(!ConnectionState::Error.is_live());
    /// ```
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Active)
    }

    /// A short human-readable label suitable for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Active => "Active",
            ConnectionState::Closing => "Closing",
            ConnectionState::Error => "Error",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Idle
    }
}

// ---------------------------------------------------------------------------
// SharedConnectionState
// ---------------------------------------------------------------------------

/// Thread-safe handle to the current [`ConnectionState`].
///
/// Cheap to clone.  Lock only for short critical sections; never across an
/// `.await`.
pub type SharedConnectionState = Arc<Mutex<ConnectionState>>;

/// Read the current state, tolerating a poisoned lock.
pub(crate) fn current_state(state: &SharedConnectionState) -> ConnectionState {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Store a new state, tolerating a poisoned lock.
pub(crate) fn set_state(state: &SharedConnectionState, next: ConnectionState) {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    log::debug!("session: state → {}", next.label());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- ConnectionState::is_live ---

    #[test]
    fn idle_is_not_live() {
        assert!(!ConnectionState::Idle.is_live());
    }

    #[test]
    fn connecting_is_live() {
        assert!(ConnectionState::Connecting.is_live());
    }

    #[test]
    fn active_is_live() {
        assert!(ConnectionState::Active.is_live());
    }

    #[test]
    fn closing_is_not_live() {
        assert!(!ConnectionState::Closing.is_live());
    }

    #[test]
    fn error_is_not_live() {
        assert!(!ConnectionState::Error.is_live());
    }

    // ---- ConnectionState::label ---

    #[test]
    fn labels() {
        assert_eq!(ConnectionState::Idle.label(), "Idle");
        assert_eq!(ConnectionState::Connecting.label(), "Connecting");
        assert_eq!(ConnectionState::Active.label(), "Active");
        assert_eq!(ConnectionState::Closing.label(), "Closing");
        assert_eq!(ConnectionState::Error.label(), "Error");
    }

    // ---- Default / shared handle ---

    #[test]
    fn default_state_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn shared_state_round_trips() {
        let state: SharedConnectionState = Arc::new(Mutex::new(ConnectionState::default()));
        assert_eq!(current_state(&state), ConnectionState::Idle);

        set_state(&state, ConnectionState::Active);
        assert_eq!(current_state(&state), ConnectionState::Active);
    }
}
