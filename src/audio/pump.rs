//! Capture pump — raw microphone blocks in, encoded wire frames out.
//!
//! Runs on a dedicated `capture-pump` thread fed by the capture device:
//!
//! ```text
//! CaptureBlock (native rate/channels)
//!   └─▶ downmix_to_mono ─▶ resample_linear(native → wire rate)
//!         └─▶ RingBuffer ── pop_frame(frame_samples) ─▶ codec::encode_frame
//!               └─▶ OutboundQueue (bounded, drop-oldest) ─▶ transport sender
//! ```
//!
//! Frames are produced in strict capture order and never reordered.  The
//! only place audio is discarded is the bounded [`OutboundQueue`]: when the
//! transport cannot keep up, the *oldest* queued frames are dropped and
//! counted, keeping latency bounded at roughly
//! `max_queued_frames × frame_samples / wire_rate` seconds.
//!
//! While the session is still connecting, frames accumulate in the queue
//! and drain as soon as the streaming gate opens — nothing captured during
//! the handshake is lost unless the bound is hit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

use crate::codec;
use crate::transport::MediaBlob;

use super::backend::AudioError;
use super::buffer::RingBuffer;
use super::capture::CaptureBlock;
use super::resample::{downmix_to_mono, resample_linear};

// ---------------------------------------------------------------------------
// PumpConfig
// ---------------------------------------------------------------------------

/// Static parameters for one pump run.
#[derive(Debug, Clone)]
pub(crate) struct PumpConfig {
    /// Wire input rate in Hz (what the remote service expects).
    pub wire_rate: u32,
    /// Samples per outbound frame at the wire rate.
    pub frame_samples: usize,
    /// Bound of the drop-oldest frame queue.
    pub max_queued_frames: usize,
}

// ---------------------------------------------------------------------------
// OutboundQueue
// ---------------------------------------------------------------------------

/// Bounded FIFO of encoded frames with drop-oldest overflow.
struct OutboundQueue {
    frames: VecDeque<MediaBlob>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Enqueue a frame, evicting the oldest when full.
    fn push(&mut self, frame: MediaBlob) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
            self.dropped += 1;
            log::warn!(
                "pump: outbound queue full — dropped oldest frame ({} dropped total)",
                self.dropped
            );
        }
        self.frames.push_back(frame);
    }

    fn pop(&mut self) -> Option<MediaBlob> {
        self.frames.pop_front()
    }

    /// Put a frame back at the head after a failed send attempt.
    fn requeue_front(&mut self, frame: MediaBlob) {
        self.frames.push_front(frame);
    }

    fn len(&self) -> usize {
        self.frames.len()
    }
}

// ---------------------------------------------------------------------------
// PumpHandle
// ---------------------------------------------------------------------------

/// Join handle for the pump thread.
///
/// The pump exits on its own once the capture device closes its sink;
/// [`stop`](Self::stop) then joins the thread.  Call it only after the
/// capture stream has been stopped, or it will wait for more audio.
pub(crate) struct PumpHandle {
    join: Option<std::thread::JoinHandle<()>>,
}

impl PumpHandle {
    pub(crate) fn stop(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("pump: thread panicked during shutdown");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// spawn
// ---------------------------------------------------------------------------

/// Spawn the capture pump thread.
///
/// `streaming` gates draining: frames queue up while it is `false`
/// (connection handshake in flight) and flow once the session is active.
pub(crate) fn spawn(
    config: PumpConfig,
    raw_rx: std_mpsc::Receiver<CaptureBlock>,
    outbound: Sender<MediaBlob>,
    streaming: Arc<AtomicBool>,
) -> Result<PumpHandle, AudioError> {
    let join = std::thread::Builder::new()
        .name("capture-pump".into())
        .spawn(move || run(config, raw_rx, outbound, streaming))
        .map_err(|e| AudioError::Thread(e.to_string()))?;

    Ok(PumpHandle { join: Some(join) })
}

fn run(
    config: PumpConfig,
    raw_rx: std_mpsc::Receiver<CaptureBlock>,
    outbound: Sender<MediaBlob>,
    streaming: Arc<AtomicBool>,
) {
    let frame_samples = config.frame_samples.max(1);
    // Room for a few frames of slack between pops; the queue, not the ring,
    // is the intentional drop point.
    let mut ring = RingBuffer::new(frame_samples * 4);
    let mut queue = OutboundQueue::new(config.max_queued_frames);
    let mime_type = format!("audio/pcm;rate={}", config.wire_rate);

    while let Ok(block) = raw_rx.recv() {
        let mono = downmix_to_mono(&block.samples, block.channels);
        let samples = if block.sample_rate != config.wire_rate {
            resample_linear(&mono, block.sample_rate, config.wire_rate)
        } else {
            mono
        };
        ring.push_slice(&samples);

        while let Some(frame) = ring.pop_frame(frame_samples) {
            queue.push(MediaBlob {
                data: codec::encode_frame(&frame),
                mime_type: mime_type.clone(),
            });
        }

        if !streaming.load(Ordering::Acquire) {
            continue;
        }

        while let Some(frame) = queue.pop() {
            match outbound.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    // Transport is momentarily saturated; keep the frame at
                    // the head and retry on the next capture block.
                    queue.requeue_front(frame);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    log::warn!("pump: transport closed, stopping capture pump");
                    return;
                }
            }
        }
    }

    log::debug!(
        "pump: capture channel closed, exiting ({} frames still queued)",
        queue.len()
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn block(samples: Vec<f32>, sample_rate: u32, channels: u16) -> CaptureBlock {
        CaptureBlock {
            samples,
            sample_rate,
            channels,
        }
    }

    fn test_config(frame_samples: usize, max_queued_frames: usize) -> PumpConfig {
        PumpConfig {
            wire_rate: 16_000,
            frame_samples,
            max_queued_frames,
        }
    }

    // ---- OutboundQueue -----------------------------------------------------

    #[test]
    fn queue_is_fifo() {
        let mut queue = OutboundQueue::new(4);
        for i in 0..3 {
            queue.push(MediaBlob {
                data: format!("frame-{i}"),
                mime_type: "audio/pcm;rate=16000".into(),
            });
        }

        assert_eq!(queue.pop().unwrap().data, "frame-0");
        assert_eq!(queue.pop().unwrap().data, "frame-1");
        assert_eq!(queue.pop().unwrap().data, "frame-2");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn queue_overflow_drops_oldest() {
        let mut queue = OutboundQueue::new(2);
        for i in 0..5 {
            queue.push(MediaBlob {
                data: format!("frame-{i}"),
                mime_type: "audio/pcm;rate=16000".into(),
            });
        }

        assert_eq!(queue.dropped, 3);
        assert_eq!(queue.pop().unwrap().data, "frame-3");
        assert_eq!(queue.pop().unwrap().data, "frame-4");
    }

    #[test]
    fn requeue_front_preserves_order() {
        let mut queue = OutboundQueue::new(4);
        queue.push(MediaBlob {
            data: "a".into(),
            mime_type: String::new(),
        });
        queue.push(MediaBlob {
            data: "b".into(),
            mime_type: String::new(),
        });

        let head = queue.pop().unwrap();
        queue.requeue_front(head);

        assert_eq!(queue.pop().unwrap().data, "a");
        assert_eq!(queue.pop().unwrap().data, "b");
    }

    // ---- Pump end-to-end ---------------------------------------------------

    #[test]
    fn pump_slices_blocks_into_exact_frames() {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::channel(8);
        let streaming = Arc::new(AtomicBool::new(true));

        let mut handle = spawn(test_config(160, 8), raw_rx, out_tx, streaming).unwrap();

        // 400 samples at the wire rate → two full frames + 80 left over.
        raw_tx
            .send(block(vec![0.25; 400], 16_000, 1))
            .unwrap();
        drop(raw_tx);
        handle.stop();

        let first = out_rx.try_recv().unwrap();
        let second = out_rx.try_recv().unwrap();
        assert!(out_rx.try_recv().is_err());

        assert_eq!(first.mime_type, "audio/pcm;rate=16000");
        let decoded = crate::codec::decode_chunk(&first.data).unwrap();
        assert_eq!(decoded.len(), 160);
        assert!((decoded[0] - 0.25).abs() < 1.0 / 32768.0);
        assert_eq!(crate::codec::decode_chunk(&second.data).unwrap().len(), 160);
    }

    #[test]
    fn pump_downmixes_and_resamples_to_wire_rate() {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::channel(8);
        let streaming = Arc::new(AtomicBool::new(true));

        let mut handle = spawn(test_config(160, 8), raw_rx, out_tx, streaming).unwrap();

        // 48 kHz stereo: 960 interleaved samples → 480 mono → 160 at 16 kHz.
        raw_tx
            .send(block(vec![0.5; 960], 48_000, 2))
            .unwrap();
        drop(raw_tx);
        handle.stop();

        let frame = out_rx.try_recv().unwrap();
        let decoded = crate::codec::decode_chunk(&frame.data).unwrap();
        assert_eq!(decoded.len(), 160);
        assert!((decoded[80] - 0.5).abs() < 1.0 / 32768.0);
    }

    #[test]
    fn frames_buffer_while_streaming_gate_is_closed() {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::channel(8);
        let streaming = Arc::new(AtomicBool::new(false));

        let mut handle = spawn(
            test_config(100, 8),
            raw_rx,
            out_tx,
            Arc::clone(&streaming),
        )
        .unwrap();

        // First block arrives during the handshake — must not be sent yet,
        // but must not be lost either.
        raw_tx.send(block(vec![0.1; 100], 16_000, 1)).unwrap();
        // Open the gate, then push another block to trigger a drain.
        streaming.store(true, Ordering::Release);
        raw_tx.send(block(vec![0.2; 100], 16_000, 1)).unwrap();
        drop(raw_tx);
        handle.stop();

        let first = crate::codec::decode_chunk(&out_rx.try_recv().unwrap().data).unwrap();
        let second = crate::codec::decode_chunk(&out_rx.try_recv().unwrap().data).unwrap();

        // Capture order preserved across the gate opening.
        assert!((first[0] - 0.1).abs() < 1.0 / 32768.0);
        assert!((second[0] - 0.2).abs() < 1.0 / 32768.0);
    }

    #[test]
    fn pump_exits_when_transport_closes() {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        let (out_tx, out_rx) = tokio::sync::mpsc::channel(1);
        let streaming = Arc::new(AtomicBool::new(true));

        let mut handle = spawn(test_config(10, 4), raw_rx, out_tx, streaming).unwrap();

        drop(out_rx); // transport goes away
        raw_tx.send(block(vec![0.1; 20], 16_000, 1)).unwrap();

        // The pump must notice the closed channel and exit; stop() would
        // hang forever if it kept waiting for capture blocks.
        handle.stop();
        drop(raw_tx);
    }
}
