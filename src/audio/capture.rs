//! Microphone capture via `cpal`.
//!
//! The stream lives on a dedicated `capture-stream` thread (cpal streams are
//! not `Send` everywhere).  The thread builds and starts the stream, reports
//! the device's native format back to the caller, then parks until the
//! [`StreamControl`](super::backend::StreamControl) handle is stopped.
//!
//! Each hardware buffer becomes one [`CaptureBlock`] on the sink channel;
//! send errors are ignored so the audio thread never panics when the pump
//! has gone away.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;

use super::backend::{AudioError, CaptureDevice, ThreadStream};

// ---------------------------------------------------------------------------
// CaptureBlock
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]` at the device's native
/// rate and channel count.  The pump downmixes and resamples before
/// framing.
#[derive(Debug, Clone)]
pub struct CaptureBlock {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this block in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// open
// ---------------------------------------------------------------------------

/// Acquire the system default input device and start streaming.
///
/// # Errors
///
/// [`AudioError::NoInputDevice`] when no microphone is available, or the
/// corresponding cpal error when the stream cannot be configured or
/// started.
pub(crate) fn open(sink: std_mpsc::Sender<CaptureBlock>) -> Result<CaptureDevice, AudioError> {
    let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(u32, u16), AudioError>>();
    let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

    let join = std::thread::Builder::new()
        .name("capture-stream".into())
        .spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(AudioError::NoInputDevice));
                    return;
                }
            };

            let supported = match device.default_input_config() {
                Ok(supported) => supported,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            let channels = supported.channels();
            let sample_rate = supported.sample_rate().0;
            let config: cpal::StreamConfig = supported.into();

            let stream = match device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Ignore send errors; the pump may have been dropped.
                    let _ = sink.send(CaptureBlock {
                        samples: data.to_vec(),
                        sample_rate,
                        channels,
                    });
                },
                |err: cpal::StreamError| {
                    log::error!("capture stream error: {err}");
                },
                None, // no timeout
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }

            log::info!("capture: streaming at {sample_rate} Hz, {channels} ch");
            let _ = ready_tx.send(Ok((sample_rate, channels)));

            // Park until the control handle closes the stop channel.
            let _ = stop_rx.recv();
            drop(stream);
            log::debug!("capture: stream stopped");
        })
        .map_err(|e| AudioError::Thread(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok((sample_rate, channels))) => Ok(CaptureDevice {
            control: Box::new(ThreadStream::new(stop_tx, join)),
            sample_rate,
            channels,
        }),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => {
            let _ = join.join();
            Err(AudioError::Thread(
                "capture thread exited before reporting readiness".into(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// `CaptureBlock` must be `Send` so it can cross thread boundaries.
    #[test]
    fn capture_block_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CaptureBlock>();
    }

    #[test]
    fn capture_block_fields() {
        let block = CaptureBlock {
            samples: vec![0.0_f32; 512],
            sample_rate: 48_000,
            channels: 2,
        };
        assert_eq!(block.samples.len(), 512);
        assert_eq!(block.sample_rate, 48_000);
        assert_eq!(block.channels, 2);
    }
}
