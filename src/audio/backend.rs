//! Audio device abstraction — the seam between the session and the hardware.
//!
//! [`AudioBackend`] is the object-safe trait the session uses to acquire its
//! two devices.  The production implementation is [`CpalBackend`]; tests
//! inject a mock so the full connection state machine runs without any audio
//! hardware.
//!
//! cpal streams are not `Send` on every platform, so each open device lives
//! on a dedicated named OS thread that builds the stream, reports readiness,
//! and parks until stopped.  The [`StreamControl`] handle returned to the
//! session *is* `Send`; its `stop()` joins the thread, which is the
//! "awaiting asynchronous teardown" step of `disconnect`.

use std::sync::mpsc as std_mpsc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::playback::{PlaybackEvent, SharedScheduler};

use super::capture::{self, CaptureBlock};
use super::output;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or running an audio device.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no input device found on the default audio host")]
    NoInputDevice,

    #[error("no output device found on the default audio host")]
    NoOutputDevice,

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio stream thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// StreamControl
// ---------------------------------------------------------------------------

/// Send-able handle to a running device stream.
///
/// `stop()` is idempotent and blocks until the stream is fully torn down.
/// Dropping a handle without calling `stop()` stops the stream too, so a
/// handle can never leak a live device.
pub trait StreamControl: Send {
    fn stop(&mut self);
}

/// [`StreamControl`] over a stream owned by a dedicated OS thread.
///
/// Closing the stop channel unparks the thread; joining it guarantees the
/// cpal stream has been dropped before `stop()` returns.
pub(crate) struct ThreadStream {
    stop_tx: Option<std_mpsc::Sender<()>>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl ThreadStream {
    pub(crate) fn new(stop_tx: std_mpsc::Sender<()>, join: std::thread::JoinHandle<()>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        }
    }
}

impl StreamControl for ThreadStream {
    fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("audio: stream thread panicked during shutdown");
            }
        }
    }
}

impl Drop for ThreadStream {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Device descriptors
// ---------------------------------------------------------------------------

/// An acquired microphone stream.
///
/// Raw capture blocks flow into the sink passed to
/// [`AudioBackend::open_capture`]; `sample_rate` and `channels` describe the
/// device's native format (the pump downmixes and resamples).
pub struct CaptureDevice {
    pub control: Box<dyn StreamControl>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// An acquired output stream with its scheduler.
///
/// The backend constructs the [`SharedScheduler`] because only it knows the
/// device's native rate — the scheduler's clock domain.
pub struct PlaybackDevice {
    pub control: Box<dyn StreamControl>,
    pub sample_rate: u32,
    pub scheduler: SharedScheduler,
}

// ---------------------------------------------------------------------------
// AudioBackend
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe factory for the session's two devices.
pub trait AudioBackend: Send + Sync {
    /// Acquire the default microphone and start streaming raw blocks into
    /// `sink`.
    fn open_capture(
        &self,
        settings: &crate::config::AudioSettings,
        sink: std_mpsc::Sender<CaptureBlock>,
    ) -> Result<CaptureDevice, AudioError>;

    /// Acquire the default output device and start rendering from a fresh
    /// scheduler, reporting activity levels on `events`.
    fn open_playback(
        &self,
        settings: &crate::config::AudioSettings,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<PlaybackDevice, AudioError>;
}

// Compile-time assertion: Box<dyn AudioBackend> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioBackend>) {}
};

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// Production backend using the system default cpal devices.
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open_capture(
        &self,
        _settings: &crate::config::AudioSettings,
        sink: std_mpsc::Sender<CaptureBlock>,
    ) -> Result<CaptureDevice, AudioError> {
        capture::open(sink)
    }

    fn open_playback(
        &self,
        settings: &crate::config::AudioSettings,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<PlaybackDevice, AudioError> {
        output::open(settings.interrupt_policy, events)
    }
}
