//! Playback scheduling — ordered, gapless output with bulk cancellation.
//!
//! # Architecture
//!
//! ```text
//! transport Audio event ─▶ codec::decode_chunk ─▶ resample to device rate
//!                                                        │
//!                                                        ▼
//!                         SharedScheduler (Arc<Mutex<PlaybackScheduler>>)
//!                            ▲                           │
//!        schedule/interrupt  │                           │  render()
//!        (session event loop)│                           ▼
//!                            │                 output device callback
//!                            │                           │
//!                            └── PlaybackEvent::Level ◀──┘
//! ```
//!
//! The scheduler itself is a plain struct with no device knowledge; the
//! output device callback and the session event loop share it behind a
//! mutex and are its only writers.

pub mod scheduler;

use std::sync::{Arc, Mutex};

pub use scheduler::{InterruptPolicy, PlaybackScheduler, RenderReport};

// ---------------------------------------------------------------------------
// SharedScheduler
// ---------------------------------------------------------------------------

/// Thread-safe handle to the [`PlaybackScheduler`].
///
/// Cheap to clone.  Both writers (device callback, session event loop) lock
/// it only for short, await-free critical sections.
pub type SharedScheduler = Arc<Mutex<PlaybackScheduler>>;

/// Construct a [`SharedScheduler`] for an output stream at `sample_rate` Hz.
pub fn new_shared_scheduler(sample_rate: u32, policy: InterruptPolicy) -> SharedScheduler {
    Arc::new(Mutex::new(PlaybackScheduler::new(sample_rate, policy)))
}

// ---------------------------------------------------------------------------
// PlaybackEvent
// ---------------------------------------------------------------------------

/// Telemetry emitted by the output device callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    /// Output activity level in `[0.0, 1.0]`; `0.0` is sent once when the
    /// pending set drains.
    Level(f32),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_scheduler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedScheduler>();
    }

    #[test]
    fn shared_scheduler_can_be_cloned_and_mutated() {
        let sched = new_shared_scheduler(24_000, InterruptPolicy::ResetToZero);
        let sched2 = Arc::clone(&sched);

        sched.lock().unwrap().schedule(vec![0.1; 10]);
        assert_eq!(sched2.lock().unwrap().pending_len(), 1);
    }
}
