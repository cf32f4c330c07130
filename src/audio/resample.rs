//! Sample-rate conversion and channel mixing utilities.
//!
//! The session runs three clock domains: the capture device's native rate,
//! the wire input rate (16 kHz by default), and the playback path from the
//! wire output rate (24 kHz by default) to the output device's native rate.
//! This module provides the two conversion steps used at those boundaries:
//!
//! 1. [`downmix_to_mono`] — average any number of interleaved channels down
//!    to one.
//! 2. [`resample_linear`] — convert between arbitrary sample rates with
//!    linear interpolation.
//!
//! Linear interpolation is plenty for 16-bit speech audio and keeps the
//! pipeline allocation-light; a windowed-sinc resampler would be the upgrade
//! path if music-grade output were ever needed.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all
/// channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input is returned as an owned `Vec` unchanged.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use voice_live::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!(mono[0].abs() < 1e-6);
/// assert!(mono[1].abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` Hz to `target_rate` Hz using
/// linear interpolation.
///
/// * If the rates match (or either rate is zero, or the input is empty) the
///   input is cloned and returned unchanged.
/// * The output length is `samples.len() * target_rate / source_rate`,
///   rounded down.
///
/// Works in both directions — the capture path downsamples (e.g.
/// 48 kHz → 16 kHz), the playback path usually upsamples (e.g.
/// 24 kHz → 48 kHz).
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if samples.is_empty() || source_rate == 0 || target_rate == 0 || source_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let s0 = samples[idx.min(samples.len() - 1)];
        let s1 = if idx + 1 < samples.len() {
            samples[idx + 1]
        } else {
            s0
        };

        out.push(s0 + (s1 - s0) * frac);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- downmix_to_mono ---------------------------------------------------

    #[test]
    fn mono_input_is_passed_through() {
        let mono = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&mono, 1), mono);
    }

    #[test]
    fn stereo_is_averaged() {
        let stereo = vec![1.0_f32, 0.0, 0.5, 0.5];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_channels_yields_empty() {
        assert!(downmix_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    // ---- resample_linear ---------------------------------------------------

    #[test]
    fn same_rate_is_a_no_op() {
        let samples = vec![0.1_f32; 160];
        let out = resample_linear(&samples, 16_000, 16_000);
        assert_eq!(out, samples);
    }

    #[test]
    fn downsample_three_to_one_length() {
        let samples = vec![0.5_f32; 480];
        let out = resample_linear(&samples, 48_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn upsample_doubles_length() {
        let samples = vec![0.5_f32; 240];
        let out = resample_linear(&samples, 24_000, 48_000);
        assert_eq!(out.len(), 480);
    }

    #[test]
    fn constant_signal_is_preserved() {
        let samples = vec![0.25_f32; 300];
        for &out_rate in &[8_000_u32, 16_000, 44_100, 48_000] {
            for sample in resample_linear(&samples, 24_000, out_rate) {
                assert!((sample - 0.25).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn upsampled_ramp_stays_monotonic() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = resample_linear(&samples, 16_000, 48_000);
        for pair in out.windows(2) {
            assert!(pair[0] <= pair[1] + 1e-6);
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn zero_rate_is_a_passthrough() {
        let samples = vec![0.1_f32; 10];
        assert_eq!(resample_linear(&samples, 0, 16_000), samples);
        assert_eq!(resample_linear(&samples, 16_000, 0), samples);
    }
}
