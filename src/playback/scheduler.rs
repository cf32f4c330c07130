//! Gapless playback scheduling over a sample-accurate device clock.
//!
//! [`PlaybackScheduler`] turns a bursty stream of decoded audio chunks into
//! back-to-back output.  It keeps two counters in the output device's clock
//! domain (frames since the stream opened):
//!
//! * `clock` — how many frames the device has actually rendered.
//! * `next_slot` — the first frame not yet claimed by a scheduled chunk.
//!
//! Each chunk starts at `max(clock, next_slot)`: never in the past, and
//! never before the previous chunk has finished.  Chunks arriving in a burst
//! therefore queue seamlessly, while a chunk arriving after a long silence
//! starts immediately.
//!
//! Scheduled chunks live in an ordered pending map keyed by a monotonically
//! increasing handle id, so a barge-in can stop everything with one bulk
//! [`interrupt`](PlaybackScheduler::interrupt).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// InterruptPolicy
// ---------------------------------------------------------------------------

/// What happens to `next_slot` when playback is interrupted.
///
/// Either the slot clock resets to zero and the `max(clock, next_slot)`
/// clamp pulls the next chunk forward, or the slot pins to the current
/// device clock.  Both end up scheduling the next chunk at the device
/// clock — they differ only if the clamp were ever removed, so the choice
/// is kept explicit and configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptPolicy {
    /// Reset `next_slot` to zero ("start fresh").
    ResetToZero,
    /// Reset `next_slot` to the current device clock ("resume from now").
    ResetToDeviceClock,
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self::ResetToZero
    }
}

// ---------------------------------------------------------------------------
// RenderReport
// ---------------------------------------------------------------------------

/// Outcome of one [`render`](PlaybackScheduler::render) pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderReport {
    /// RMS level of the rendered block, clamped to `[0.0, 1.0]`.
    pub level: f32,
    /// `true` when at least one pending chunk contributed samples.
    pub active: bool,
    /// `true` on the single render pass where the pending set drained to
    /// empty — the caller reports a volume of `0.0` on this edge.
    pub became_idle: bool,
}

// ---------------------------------------------------------------------------
// PlaybackScheduler
// ---------------------------------------------------------------------------

/// One chunk of audio scheduled at a fixed start frame.
#[derive(Debug)]
struct Scheduled {
    start: u64,
    samples: Vec<f32>,
}

impl Scheduled {
    fn end(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

/// Sample-accurate chunk scheduler for the output device.
///
/// All positions are in mono frames at [`sample_rate`](Self::sample_rate).
/// The output device callback drives [`render`](Self::render); the session's
/// event loop drives [`schedule`](Self::schedule) and
/// [`interrupt`](Self::interrupt).  Callers serialise access behind a mutex
/// (see [`SharedScheduler`](crate::playback::SharedScheduler)).
#[derive(Debug)]
pub struct PlaybackScheduler {
    sample_rate: u32,
    /// Frames rendered by the device since the stream opened.
    clock: u64,
    /// First frame not yet claimed by a scheduled chunk.
    next_slot: u64,
    next_handle: u64,
    pending: BTreeMap<u64, Scheduled>,
    policy: InterruptPolicy,
}

impl PlaybackScheduler {
    /// Create a scheduler for an output stream running at `sample_rate` Hz.
    pub fn new(sample_rate: u32, policy: InterruptPolicy) -> Self {
        Self {
            sample_rate,
            clock: 0,
            next_slot: 0,
            next_handle: 0,
            pending: BTreeMap::new(),
            policy,
        }
    }

    /// Schedule `samples` to play as soon as the gapless invariant allows.
    ///
    /// Returns the chunk's handle id and its start position in device
    /// frames: `max(clock, next_slot)` — never before the device's current
    /// time and never overlapping the previous chunk.
    pub fn schedule(&mut self, samples: Vec<f32>) -> (u64, u64) {
        let start = self.clock.max(self.next_slot);
        let handle = self.next_handle;
        self.next_handle += 1;
        self.next_slot = start + samples.len() as u64;

        if !samples.is_empty() {
            self.pending.insert(handle, Scheduled { start, samples });
        }
        (handle, start)
    }

    /// Mix every pending chunk overlapping the next `out.len()` frames into
    /// `out`, then advance the device clock past them.
    ///
    /// Chunks that finish inside this window are retired from the pending
    /// set; the returned report carries the became-idle edge exactly once.
    pub fn render(&mut self, out: &mut [f32]) -> RenderReport {
        out.fill(0.0);

        let had_pending = !self.pending.is_empty();
        let window_start = self.clock;
        let window_end = self.clock + out.len() as u64;
        let mut active = false;

        for chunk in self.pending.values() {
            let from = chunk.start.max(window_start);
            let to = chunk.end().min(window_end);
            if from >= to {
                continue;
            }
            active = true;
            for pos in from..to {
                out[(pos - window_start) as usize] +=
                    chunk.samples[(pos - chunk.start) as usize];
            }
        }

        self.clock = window_end;
        self.pending.retain(|_, chunk| chunk.end() > window_end);

        RenderReport {
            level: if active { rms(out).min(1.0) } else { 0.0 },
            active,
            became_idle: had_pending && self.pending.is_empty(),
        }
    }

    /// Stop all pending chunks immediately (barge-in / flush).
    ///
    /// Clears the pending set and resets `next_slot` according to the
    /// configured [`InterruptPolicy`].  Returns the number of chunks that
    /// were stopped.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.pending.len();
        self.pending.clear();
        self.next_slot = match self.policy {
            InterruptPolicy::ResetToZero => 0,
            InterruptPolicy::ResetToDeviceClock => self.clock,
        };
        stopped
    }

    /// Number of chunks scheduled but not yet finished.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Frames rendered by the device so far.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// First frame not yet claimed by a scheduled chunk.
    pub fn next_slot(&self) -> u64 {
        self.next_slot
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Convert a frame position to seconds at this scheduler's rate.
    pub fn to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
