//! PCM wire codec — `f32` samples ↔ 16-bit little-endian PCM ↔ base64 text.
//!
//! The remote service exchanges audio as base64-encoded 16-bit LE PCM inside
//! JSON messages.  This module holds the pure conversion functions used by
//! both directions of the pipeline:
//!
//! ```text
//! capture:  &[f32] ── samples_to_pcm16 ──▶ bytes ── base64 ──▶ String
//! playback: String ── base64 ──▶ bytes ── pcm16_to_samples ──▶ Vec<f32>
//! ```
//!
//! All functions are stateless.  Out-of-range input samples are clamped to
//! the representable `i16` range rather than wrapped — wrapping turns a
//! slightly-hot microphone into full-scale clicks.
//!
//! # Example
//!
//! ```rust
//! use voice_live::codec::{decode_chunk, encode_frame};
//!
//! let samples = vec![0.0_f32, 0.5, -0.5, 1.0];
//! let encoded = encode_frame(&samples);
//! let decoded = decode_chunk(&encoded).unwrap();
//!
//! for (a, b) in samples.iter().zip(decoded.iter()) {
//!     assert!((a - b).abs() <= 1.0 / 32768.0);
//! }
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Scale factor between normalised `f32` samples and `i16` PCM.
const PCM_SCALE: f32 = 32768.0;

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// Errors that can occur while decoding an inbound audio payload.
///
/// Decode failures are always local to a single chunk — callers skip the
/// chunk and keep the session running.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was not valid base64.
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

// ---------------------------------------------------------------------------
// f32 ↔ i16 PCM
// ---------------------------------------------------------------------------

/// Convert normalised `f32` samples in `[-1.0, 1.0]` to packed 16-bit LE PCM.
///
/// Samples outside the normalised range are clamped to the `i16` range, so a
/// value of `2.0` encodes as `i16::MAX` rather than wrapping negative.
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * PCM_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert packed 16-bit LE PCM bytes back to normalised `f32` samples.
///
/// A trailing partial sample (odd byte count) is truncated rather than read
/// out of bounds — network chunks are not guaranteed to be block-aligned.
pub fn pcm16_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect()
}

// ---------------------------------------------------------------------------
// base64 framing
// ---------------------------------------------------------------------------

/// Encode one outbound capture frame as transport-safe text.
pub fn encode_frame(samples: &[f32]) -> String {
    STANDARD.encode(samples_to_pcm16(samples))
}

/// Decode one inbound audio chunk into playable samples.
///
/// # Errors
///
/// Returns [`CodecError::Base64`] when the payload is not valid base64.
pub fn decode_chunk(payload: &str) -> Result<Vec<f32>, CodecError> {
    let bytes = STANDARD.decode(payload)?;
    Ok(pcm16_to_samples(&bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1.0 / 32768.0;

    // ---- Round trip --------------------------------------------------------

    #[test]
    fn round_trip_within_one_lsb() {
        let samples: Vec<f32> = vec![0.0, 1.0, -1.0, 0.5, -0.5, 0.333, -0.125, 0.999];
        let decoded = decode_chunk(&encode_frame(&samples)).unwrap();

        assert_eq!(decoded.len(), samples.len());
        for (original, recovered) in samples.iter().zip(decoded.iter()) {
            assert!(
                (original - recovered).abs() <= EPSILON,
                "sample {original} decoded as {recovered}"
            );
        }
    }

    #[test]
    fn round_trip_swept_sine() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| (i as f32 * 0.013).sin() * 0.8)
            .collect();
        let decoded = decode_chunk(&encode_frame(&samples)).unwrap();

        for (original, recovered) in samples.iter().zip(decoded.iter()) {
            assert!((original - recovered).abs() <= EPSILON);
        }
    }

    #[test]
    fn empty_frame_round_trips() {
        let encoded = encode_frame(&[]);
        assert_eq!(decode_chunk(&encoded).unwrap(), Vec::<f32>::new());
    }

    // ---- Clamping ----------------------------------------------------------

    #[test]
    fn out_of_range_samples_clamp_instead_of_wrapping() {
        let decoded = decode_chunk(&encode_frame(&[2.0, -2.0])).unwrap();

        // 2.0 clamps to i16::MAX → 32767/32768; -2.0 clamps to i16::MIN → -1.0.
        assert!((decoded[0] - (32767.0 / 32768.0)).abs() < 1e-6);
        assert!((decoded[1] - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn full_scale_negative_is_exact() {
        let decoded = decode_chunk(&encode_frame(&[-1.0])).unwrap();
        assert_eq!(decoded[0], -1.0);
    }

    // ---- Defensive decoding ------------------------------------------------

    #[test]
    fn trailing_partial_sample_is_truncated() {
        // 5 bytes = 2 complete samples + 1 stray byte.
        let encoded = STANDARD.encode([0x00_u8, 0x40, 0x00, 0xC0, 0x7F]);
        let decoded = decode_chunk(&encoded).unwrap();

        assert_eq!(decoded.len(), 2);
        assert!((decoded[0] - 0.5).abs() < 1e-6);
        assert!((decoded[1] - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn malformed_base64_is_an_error() {
        assert!(decode_chunk("!!! not base64 !!!").is_err());
    }

    #[test]
    fn little_endian_byte_order() {
        // 0.5 * 32768 = 16384 = 0x4000 → LE bytes [0x00, 0x40].
        let bytes = samples_to_pcm16(&[0.5]);
        assert_eq!(bytes, vec![0x00, 0x40]);
    }
}
