//! Audio pipeline — device acquisition, capture framing, and playback
//! rendering.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → CaptureBlock (mpsc) → capture pump
//!           → downmix_to_mono → resample_linear → RingBuffer
//!           → codec::encode_frame → bounded queue → transport
//!
//! transport → decoded chunks → PlaybackScheduler → cpal output callback
//! ```
//!
//! Both device streams live on dedicated OS threads behind [`StreamControl`]
//! handles; the session acquires them through the [`AudioBackend`] trait so
//! tests can run the whole state machine without hardware.

pub mod backend;
pub mod buffer;
pub mod capture;
pub mod output;
pub(crate) mod pump;
pub mod resample;

pub use backend::{
    AudioBackend, AudioError, CaptureDevice, CpalBackend, PlaybackDevice, StreamControl,
};
pub use buffer::RingBuffer;
pub use capture::CaptureBlock;
pub use resample::{downmix_to_mono, resample_linear};
