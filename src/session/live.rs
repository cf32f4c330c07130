//! The live session controller — `connect`, `disconnect`, inbound dispatch
//! and volume telemetry.
//!
//! [`LiveSession`] owns every resource of one connection attempt: the two
//! device handles, the capture pump, the playback scheduler and the
//! transport channel pair.  External collaborators interact only through
//! `connect`/`disconnect` and the four callbacks — nothing else may touch
//! session-owned handles.
//!
//! # Event flow
//!
//! ```text
//! connect()
//!   ├─ open capture device ──▶ raw blocks ──▶ capture pump ──▶ outbound
//!   ├─ open playback device ──▶ SharedScheduler + volume events
//!   ├─ transport.open(setup) ──▶ Connection
//!   └─ spawn event loop:
//!         Opened      → Active, on_open, open the streaming gate
//!         Audio       → decode → resample → scheduler.schedule
//!         Interrupted → scheduler.interrupt, on_volume(0.0)
//!         Closed      → Idle, on_close
//!         Error       → Error, on_error, release devices
//! ```
//!
//! Per-chunk and per-frame failures are logged and skipped; only device
//! acquisition and transport failures end the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::pump::{self, PumpConfig, PumpHandle};
use crate::audio::{AudioBackend, AudioError, CaptureBlock, CaptureDevice, PlaybackDevice, StreamControl};
use crate::codec::{self, CodecError};
use crate::config::{AppConfig, AudioSettings, SessionSettings};
use crate::playback::{PlaybackEvent, SharedScheduler};
use crate::transport::{Connection, LiveTransport, SetupConfig, TransportError, TransportEvent};

use super::state::{current_state, set_state, ConnectionState, SharedConnectionState};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors that can surface from `connect`.
///
/// `disconnect` never errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No API credential was supplied at construction.  Checked before any
    /// device is touched.
    #[error("no API credential configured")]
    MissingCredential,

    /// `connect` was called while a connection attempt is underway or live.
    #[error("session is already connecting or active")]
    AlreadyActive,

    /// A microphone or output device could not be acquired.
    #[error("audio device unavailable: {0}")]
    Device(#[from] AudioError),

    /// The transport could not be opened.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// SessionCallbacks
// ---------------------------------------------------------------------------

/// Status hooks supplied by the caller for one connect attempt.
///
/// `on_open`, `on_close` and `on_error` fire at most once each; `on_volume`
/// fires arbitrarily often while the session is `Active`, with a normalised
/// output-activity level in `[0.0, 1.0]` (`0.0` once playback drains).
pub struct SessionCallbacks {
    pub on_open: Box<dyn FnOnce() + Send>,
    pub on_close: Box<dyn FnOnce() + Send>,
    pub on_error: Box<dyn FnOnce(String) + Send>,
    pub on_volume: Box<dyn FnMut(f32) + Send>,
}

impl Default for SessionCallbacks {
    /// All hooks default to no-ops, so callers set only what they need.
    fn default() -> Self {
        Self {
            on_open: Box::new(|| {}),
            on_close: Box::new(|| {}),
            on_error: Box::new(|_| {}),
            on_volume: Box::new(|_| {}),
        }
    }
}

// ---------------------------------------------------------------------------
// Device ownership
// ---------------------------------------------------------------------------

/// Both device handles, taken and stopped together.
///
/// The invariant "all handles present or all absent" lives here: the bag is
/// filled once during `connect` and emptied atomically by
/// [`release_devices`], whichever of `disconnect` or the transport-error
/// path gets there first.
#[derive(Default)]
struct DeviceBag {
    capture: Option<Box<dyn StreamControl>>,
    playback: Option<Box<dyn StreamControl>>,
}

type SharedDevices = Arc<Mutex<DeviceBag>>;

/// Stop and drop both devices.  Idempotent; blocks until the stream threads
/// have joined, so call it from a blocking context.
fn release_devices(devices: &SharedDevices) {
    let (capture, playback) = {
        // A poisoned lock still lets us drain the handles.
        let mut bag = devices.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (bag.capture.take(), bag.playback.take())
    };

    if let Some(mut control) = capture {
        control.stop();
    }
    if let Some(mut control) = playback {
        control.stop();
    }
}

// ---------------------------------------------------------------------------
// LiveSession
// ---------------------------------------------------------------------------

/// Everything owned by one live connection attempt.
struct ActiveParts {
    devices: SharedDevices,
    scheduler: SharedScheduler,
    pump: PumpHandle,
    streaming: Arc<AtomicBool>,
    event_task: tokio::task::JoinHandle<()>,
}

/// Client controller for one bidirectional voice session at a time.
///
/// Construct with [`LiveSession::new`], then drive with
/// [`connect`](Self::connect) and [`disconnect`](Self::disconnect).  The
/// transport and audio backend are injected so tests can run the full state
/// machine with mocks.
pub struct LiveSession {
    credential: String,
    session: SessionSettings,
    audio: AudioSettings,
    transport: Arc<dyn LiveTransport>,
    backend: Arc<dyn AudioBackend>,
    state: SharedConnectionState,
    active: Option<ActiveParts>,
}

impl LiveSession {
    /// Create a session from application config.
    ///
    /// The credential is taken once here; an absent or empty credential is
    /// reported by [`connect`](Self::connect), not by construction.
    pub fn new(
        config: &AppConfig,
        transport: Arc<dyn LiveTransport>,
        backend: Arc<dyn AudioBackend>,
    ) -> Self {
        Self {
            credential: config.api_key.clone().unwrap_or_default(),
            session: config.session.clone(),
            audio: config.audio.clone(),
            transport,
            backend,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            active: None,
        }
    }

    /// Current connection state (snapshot).
    pub fn state(&self) -> ConnectionState {
        current_state(&self.state)
    }

    /// Open devices and transport, and start streaming.
    ///
    /// Valid only from `Idle`; returns [`SessionError::AlreadyActive`] while
    /// a previous attempt is still connecting or live.  All other failure
    /// paths also reach `on_error` (once) before returning, with the
    /// session back in `Idle` and no device left open.
    pub async fn connect(
        &mut self,
        instruction: &str,
        callbacks: SessionCallbacks,
    ) -> Result<(), SessionError> {
        if current_state(&self.state).is_live() {
            return Err(SessionError::AlreadyActive);
        }
        // A previous attempt that ended on its own (transport close or
        // error) leaves dead parts behind; clear them before starting fresh.
        if self.active.is_some() {
            self.disconnect().await;
        }

        if self.credential.trim().is_empty() {
            return Self::fail(callbacks, SessionError::MissingCredential);
        }

        log::info!("session: connecting (model {})", self.session.model);

        // Devices first — capture, then playback.
        let (raw_tx, raw_rx) = std_mpsc::channel::<CaptureBlock>();
        let capture = match self.backend.open_capture(&self.audio, raw_tx) {
            Ok(capture) => capture,
            Err(e) => return Self::fail(callbacks, e.into()),
        };
        let CaptureDevice {
            control: mut capture_control,
            ..
        } = capture;

        let (volume_tx, volume_rx) = mpsc::unbounded_channel::<PlaybackEvent>();
        let playback = match self.backend.open_playback(&self.audio, volume_tx) {
            Ok(playback) => playback,
            Err(e) => {
                capture_control.stop();
                return Self::fail(callbacks, e.into());
            }
        };
        let PlaybackDevice {
            control: mut playback_control,
            sample_rate: playback_rate,
            scheduler,
        } = playback;

        // Transport next.
        let setup = SetupConfig {
            model: self.session.model.clone(),
            voice: self.session.voice.clone(),
            system_instruction: instruction.to_string(),
        };
        let connection = match self.transport.open(&self.credential, setup).await {
            Ok(connection) => connection,
            Err(e) => {
                capture_control.stop();
                playback_control.stop();
                return Self::fail(callbacks, e.into());
            }
        };
        let Connection { outbound, events } = connection;

        set_state(&self.state, ConnectionState::Connecting);

        // Capture pump: frames queue behind the streaming gate until the
        // server acknowledges setup.
        let streaming = Arc::new(AtomicBool::new(false));
        let pump = match pump::spawn(
            PumpConfig {
                wire_rate: self.audio.input_sample_rate,
                frame_samples: self.audio.frame_samples,
                max_queued_frames: self.audio.max_queued_frames,
            },
            raw_rx,
            outbound,
            Arc::clone(&streaming),
        ) {
            Ok(pump) => pump,
            Err(e) => {
                capture_control.stop();
                playback_control.stop();
                set_state(&self.state, ConnectionState::Idle);
                return Self::fail(callbacks, e.into());
            }
        };

        let devices: SharedDevices = Arc::new(Mutex::new(DeviceBag {
            capture: Some(capture_control),
            playback: Some(playback_control),
        }));

        let event_task = tokio::spawn(run_event_loop(EventLoopCtx {
            events,
            volume_rx,
            scheduler: Arc::clone(&scheduler),
            state: Arc::clone(&self.state),
            devices: Arc::clone(&devices),
            streaming: Arc::clone(&streaming),
            playback_rate,
            wire_output_rate: self.audio.output_sample_rate,
            callbacks,
        }));

        self.active = Some(ActiveParts {
            devices,
            scheduler,
            pump,
            streaming,
            event_task,
        });
        Ok(())
    }

    /// Tear everything down and return to `Idle`.
    ///
    /// Valid from any state and idempotent — calling it twice, or before any
    /// successful connect, does nothing the second time and never raises.
    /// Device teardown is awaited before this method returns.
    pub async fn disconnect(&mut self) {
        let Some(parts) = self.active.take() else {
            set_state(&self.state, ConnectionState::Idle);
            return;
        };

        set_state(&self.state, ConnectionState::Closing);
        log::info!("session: disconnecting");

        parts.streaming.store(false, Ordering::Release);
        parts.event_task.abort();
        let _ = parts.event_task.await;

        // Stream-thread joins are blocking; keep them off the runtime.
        let devices = parts.devices;
        let mut pump = parts.pump;
        let teardown = tokio::task::spawn_blocking(move || {
            release_devices(&devices);
            // Capture is stopped, so its sink is gone and the pump exits.
            pump.stop();
        });
        if teardown.await.is_err() {
            log::warn!("session: device teardown task panicked");
        }

        // Nothing may stay pending once disconnected.
        {
            let mut sched = parts
                .scheduler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            sched.interrupt();
        }

        set_state(&self.state, ConnectionState::Idle);
        log::info!("session: disconnected");
    }

    /// Report a connect failure through `on_error` and as a `Result`.
    fn fail(callbacks: SessionCallbacks, error: SessionError) -> Result<(), SessionError> {
        log::error!("session: connect failed: {error}");
        (callbacks.on_error)(error.to_string());
        Err(error)
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

struct EventLoopCtx {
    events: mpsc::Receiver<TransportEvent>,
    volume_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    scheduler: SharedScheduler,
    state: SharedConnectionState,
    devices: SharedDevices,
    streaming: Arc<AtomicBool>,
    /// Native rate of the output device (the scheduler's clock domain).
    playback_rate: u32,
    /// PCM rate of inbound chunks on the wire.
    wire_output_rate: u32,
    callbacks: SessionCallbacks,
}

async fn run_event_loop(ctx: EventLoopCtx) {
    let EventLoopCtx {
        mut events,
        mut volume_rx,
        scheduler,
        state,
        devices,
        streaming,
        playback_rate,
        wire_output_rate,
        callbacks,
    } = ctx;

    let SessionCallbacks {
        on_open,
        on_close,
        on_error,
        mut on_volume,
    } = callbacks;
    let mut on_open = Some(on_open);
    let mut on_close = Some(on_close);
    let mut on_error = Some(on_error);
    let mut volume_live = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransportEvent::Opened) => {
                    set_state(&state, ConnectionState::Active);
                    if let Some(cb) = on_open.take() {
                        cb();
                    }
                    streaming.store(true, Ordering::Release);
                    log::info!("session: transport open — streaming microphone audio");
                }
                Some(TransportEvent::Audio { data }) => {
                    match ingest_chunk(&scheduler, &data, wire_output_rate, playback_rate) {
                        Ok((handle, start)) => {
                            log::debug!("session: scheduled chunk #{handle} at frame {start}");
                        }
                        Err(e) => log::warn!("session: skipping undecodable chunk: {e}"),
                    }
                }
                Some(TransportEvent::Interrupted) => {
                    let stopped = {
                        scheduler
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .interrupt()
                    };
                    log::info!("session: barge-in — stopped {stopped} pending chunks");
                    on_volume(0.0);
                }
                Some(TransportEvent::TurnComplete) => {
                    log::debug!("session: model turn complete");
                }
                Some(TransportEvent::Closed { reason }) => {
                    streaming.store(false, Ordering::Release);
                    set_state(&state, ConnectionState::Idle);
                    if let Some(cb) = on_close.take() {
                        cb();
                    }
                    match reason {
                        Some(reason) => log::info!("session: transport closed: {reason}"),
                        None => log::info!("session: transport closed"),
                    }
                    break;
                }
                Some(TransportEvent::Error { detail }) => {
                    streaming.store(false, Ordering::Release);
                    set_state(&state, ConnectionState::Error);
                    log::error!("session: transport error: {detail}");
                    if let Some(cb) = on_error.take() {
                        cb(detail);
                    }
                    {
                        scheduler
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .interrupt();
                    }
                    let devices = Arc::clone(&devices);
                    let _ = tokio::task::spawn_blocking(move || release_devices(&devices)).await;
                    break;
                }
                None => {
                    // Transport dropped its event sender without a close
                    // frame; treat it as a close.
                    streaming.store(false, Ordering::Release);
                    set_state(&state, ConnectionState::Idle);
                    if let Some(cb) = on_close.take() {
                        cb();
                    }
                    log::debug!("session: transport event stream ended");
                    break;
                }
            },
            level = volume_rx.recv(), if volume_live => match level {
                Some(PlaybackEvent::Level(level)) => {
                    if current_state(&state) == ConnectionState::Active {
                        on_volume(level.clamp(0.0, 1.0));
                    }
                }
                None => volume_live = false,
            },
        }
    }
}

/// Decode one inbound chunk, convert it to the device clock domain and
/// schedule it.  Returns the scheduler handle and start frame.
fn ingest_chunk(
    scheduler: &SharedScheduler,
    payload: &str,
    wire_rate: u32,
    device_rate: u32,
) -> Result<(u64, u64), CodecError> {
    let samples = codec::decode_chunk(payload)?;
    let samples = if wire_rate != device_rate {
        crate::audio::resample_linear(&samples, wire_rate, device_rate)
    } else {
        samples
    };

    let mut sched = scheduler
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(sched.schedule(samples))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
