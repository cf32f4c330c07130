//! Output device playback via `cpal`, driven by the playback scheduler.
//!
//! Mirrors the capture side: the stream lives on a dedicated
//! `playback-stream` thread and is torn down by joining it.  The device
//! callback renders one mono block from the scheduler per hardware buffer,
//! fans it out across the device's channels, and reports the block's
//! activity level on an unbounded channel (the callback must never block).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::playback::{new_shared_scheduler, InterruptPolicy, PlaybackEvent};

use super::backend::{AudioError, PlaybackDevice, ThreadStream};

/// Acquire the system default output device and start rendering.
///
/// The returned [`PlaybackDevice`] carries the freshly constructed
/// scheduler, already ticking in the device's native clock domain.
pub(crate) fn open(
    policy: InterruptPolicy,
    events: mpsc::UnboundedSender<PlaybackEvent>,
) -> Result<PlaybackDevice, AudioError> {
    type Ready = Result<(u32, crate::playback::SharedScheduler), AudioError>;

    let (ready_tx, ready_rx) = std_mpsc::channel::<Ready>();
    let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

    let join = std::thread::Builder::new()
        .name("playback-stream".into())
        .spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(AudioError::NoOutputDevice));
                    return;
                }
            };

            let supported = match device.default_output_config() {
                Ok(supported) => supported,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            let channels = supported.channels() as usize;
            let sample_rate = supported.sample_rate().0;
            let config: cpal::StreamConfig = supported.into();

            let scheduler = new_shared_scheduler(sample_rate, policy);
            let shared = Arc::clone(&scheduler);
            let mut mono: Vec<f32> = Vec::new();

            let stream = match device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    mono.resize(frames, 0.0);

                    let report = match shared.lock() {
                        Ok(mut sched) => sched.render(&mut mono),
                        Err(_) => {
                            // Poisoned lock: emit silence rather than panic
                            // on the audio thread.
                            data.fill(0.0);
                            return;
                        }
                    };

                    for (frame, value) in data.chunks_mut(channels.max(1)).zip(mono.iter()) {
                        for sample in frame {
                            *sample = *value;
                        }
                    }

                    if report.active {
                        let _ = events.send(PlaybackEvent::Level(report.level));
                    } else if report.became_idle {
                        let _ = events.send(PlaybackEvent::Level(0.0));
                    }
                },
                |err: cpal::StreamError| {
                    log::error!("playback stream error: {err}");
                },
                None,
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

            log::info!("playback: streaming at {sample_rate} Hz, {channels} ch");
            let _ = ready_tx.send(Ok((sample_rate, scheduler)));

            let _ = stop_rx.recv();
            drop(stream);
            log::debug!("playback: stream stopped");
        })
        .map_err(|e| AudioError::Thread(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok((sample_rate, scheduler))) => Ok(PlaybackDevice {
            control: Box::new(ThreadStream::new(stop_tx, join)),
            sample_rate,
            scheduler,
        }),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => {
            let _ = join.join();
            Err(AudioError::Thread(
                "playback thread exited before reporting readiness".into(),
            ))
        }
    }
}
