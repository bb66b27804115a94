//! Separation adapter contract
//!
//! The pipeline never talks to a model directly. It hands each section's
//! clip to a [`SeparationAdapter`] and gets back an instrumental clip (the
//! mix of every non-vocal stem) with the same rate, channel count and
//! frame count.
//!
//! Adapters have an explicit lifecycle: [`load`](SeparationAdapter::load)
//! before the first clip, [`release`](SeparationAdapter::release) when the
//! run is over. Model state lives inside the adapter instance, never in a
//! global.

use crate::types::Clip;

/// Default tolerance for instrumental length mismatches (frames)
///
/// Covers codec framing and resampler rounding. Anything larger is a
/// failed separation.
pub const DEFAULT_LENGTH_TOLERANCE_FRAMES: usize = 256;

/// Trait for vocal-removal backends
///
/// `separate` must be pure with respect to its input: the result depends
/// only on the clip, so calls for different sections may run concurrently.
pub trait SeparationAdapter: Send + Sync {
    /// Acquire model resources (download, open session, ...)
    fn load(&mut self) -> anyhow::Result<()>;

    /// Produce the instrumental version of `clip`
    ///
    /// The returned clip must have the input's sample rate and channel
    /// count. Small frame-count differences are corrected by the caller;
    /// large ones fail the run.
    fn separate(&self, clip: &Clip) -> anyhow::Result<Clip>;

    /// Drop model resources; `load` may be called again afterwards
    fn release(&mut self);

    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Whether `load` has completed and `release` has not been called since
    fn is_loaded(&self) -> bool;
}

/// Bring an adapter result to the exact layout and length of its input
///
/// Returns the reason string on failure; the pipeline wraps it into
/// `SeparationFailed` with the section number.
pub fn conform_instrumental(
    original: &Clip,
    mut instrumental: Clip,
    tolerance_frames: usize,
) -> std::result::Result<Clip, String> {
    if instrumental.is_empty() {
        return Err("adapter returned empty audio".to_string());
    }
    if instrumental.channels != original.channels {
        return Err(format!(
            "adapter returned {} channels, expected {}",
            instrumental.channels, original.channels
        ));
    }
    if instrumental.sample_rate != original.sample_rate {
        return Err(format!(
            "adapter returned {} Hz audio, expected {} Hz",
            instrumental.sample_rate, original.sample_rate
        ));
    }
    if instrumental.samples.len() % instrumental.channels as usize != 0 {
        return Err("adapter returned a partial frame".to_string());
    }

    let expected = original.frames();
    let actual = instrumental.frames();
    if actual == expected {
        return Ok(instrumental);
    }

    let diff = expected.abs_diff(actual);
    if diff > tolerance_frames {
        return Err(format!(
            "adapter returned {} frames, expected {} (off by {}, tolerance {})",
            actual, expected, diff, tolerance_frames
        ));
    }

    let ch = original.channels as usize;
    if actual < expected {
        log::warn!(
            "conform_instrumental: padding {} missing frames with silence",
            diff
        );
    } else {
        log::warn!("conform_instrumental: truncating {} extra frames", diff);
    }
    instrumental.samples.resize(expected * ch, 0.0);
    Ok(instrumental)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(frames: usize, channels: u16) -> Clip {
        Clip {
            sample_rate: 1000,
            channels,
            samples: vec![0.5; frames * channels as usize],
        }
    }

    #[test]
    fn test_exact_length_passes_through() {
        let original = clip(100, 2);
        let out = conform_instrumental(&original, clip(100, 2), 8).unwrap();
        assert_eq!(out, clip(100, 2));
    }

    #[test]
    fn test_short_within_tolerance_is_padded() {
        let original = clip(100, 2);
        let out = conform_instrumental(&original, clip(97, 2), 8).unwrap();
        assert_eq!(out.frames(), 100);
        assert_eq!(&out.samples[194..], &[0.0; 6]);
        assert_eq!(out.samples[193], 0.5);
    }

    #[test]
    fn test_long_within_tolerance_is_truncated() {
        let original = clip(100, 1);
        let out = conform_instrumental(&original, clip(104, 1), 8).unwrap();
        assert_eq!(out.frames(), 100);
    }

    #[test]
    fn test_gross_mismatch_fails() {
        let original = clip(10_000, 1);
        let err = conform_instrumental(&original, clip(5_000, 1), 256).unwrap_err();
        assert!(err.contains("off by 5000"));
    }

    #[test]
    fn test_layout_mismatch_fails() {
        let original = clip(100, 2);
        assert!(conform_instrumental(&original, clip(100, 1), 8).is_err());

        let mut other_rate = clip(100, 2);
        other_rate.sample_rate = 44100;
        assert!(conform_instrumental(&original, other_rate, 8).is_err());
    }

    #[test]
    fn test_empty_output_fails() {
        let original = clip(100, 2);
        assert!(conform_instrumental(&original, clip(0, 2), 1000).is_err());
    }
}
