//! Common audio types for voxcut
//!
//! Audio is held as interleaved 32-bit float PCM, the same layout the
//! decoder produces and the WAV writer consumes. A "frame" is one sample
//! per channel; all boundaries inside the pipeline are frame indices.

use std::ops::Range;

use crate::error::{ProcessingError, Result};

/// Audio sample type
pub type Sample = f32;

/// An immutable, decoded audio track
///
/// Owned by the editing session that loaded it and shared read-only with
/// processing jobs (wrap in `Arc`).
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    sample_rate: u32,
    channels: u16,
    samples: Vec<Sample>,
}

impl Track {
    /// Create a track from interleaved samples
    ///
    /// Fails if the rate or channel count is zero, or if the sample count
    /// is not a whole number of frames.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<Sample>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ProcessingError::InvalidTrack("sample rate is zero".to_string()));
        }
        if channels == 0 {
            return Err(ProcessingError::InvalidTrack("channel count is zero".to_string()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(ProcessingError::InvalidTrack(format!(
                "{} samples is not a multiple of {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// Empty track with the same layout as `self`
    pub fn empty_like(&self) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index nearest to a time position, clamped to the track length
    pub fn frame_at(&self, secs: f64) -> usize {
        if secs <= 0.0 {
            return 0;
        }
        let frame = (secs * self.sample_rate as f64).round() as usize;
        frame.min(self.frames())
    }

    /// Time position of a frame index
    pub fn secs_at(&self, frame: usize) -> f64 {
        frame as f64 / self.sample_rate as f64
    }

    /// Interleaved samples for a frame range
    ///
    /// The range is clamped to the track.
    pub fn frame_slice(&self, frames: Range<usize>) -> &[Sample] {
        let ch = self.channels as usize;
        let end = frames.end.min(self.frames());
        let start = frames.start.min(end);
        &self.samples[start * ch..end * ch]
    }

    /// Copy a frame range out as a clip
    pub fn clip(&self, frames: Range<usize>) -> Clip {
        Clip {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: self.frame_slice(frames).to_vec(),
        }
    }

    /// Append interleaved samples with the same layout
    pub(crate) fn extend_from_slice(&mut self, samples: &[Sample]) {
        debug_assert_eq!(samples.len() % self.channels as usize, 0);
        self.samples.extend_from_slice(samples);
    }

    pub(crate) fn reserve_frames(&mut self, frames: usize) {
        self.samples.reserve(frames * self.channels as usize);
    }

    /// Consume the track, returning its interleaved samples
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// A transient fragment of a track, in or out of the separation adapter
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Sample rate of the clip
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Interleaved samples
    pub samples: Vec<Sample>,
}

impl Clip {
    /// Create a silent clip
    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            samples: vec![0.0; frames * channels as usize],
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_track(rate: u32, channels: u16, frames: usize) -> Track {
        let samples = (0..frames * channels as usize).map(|i| i as f32).collect();
        Track::new(rate, channels, samples).unwrap()
    }

    #[test]
    fn test_track_rejects_partial_frames() {
        assert!(Track::new(44100, 2, vec![0.0; 3]).is_err());
        assert!(Track::new(0, 2, vec![0.0; 4]).is_err());
        assert!(Track::new(44100, 0, vec![]).is_err());
        assert!(Track::new(44100, 2, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_track_duration() {
        let track = ramp_track(1000, 2, 2500);
        assert_eq!(track.frames(), 2500);
        assert!((track.duration_secs() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_frame_at_clamps() {
        let track = ramp_track(1000, 1, 1000);
        assert_eq!(track.frame_at(-1.0), 0);
        assert_eq!(track.frame_at(0.2504), 250);
        assert_eq!(track.frame_at(0.2506), 251);
        assert_eq!(track.frame_at(5.0), 1000);
    }

    #[test]
    fn test_clip_copies_interleaved_frames() {
        let track = ramp_track(1000, 2, 10);
        let clip = track.clip(2..4);
        assert_eq!(clip.samples, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(clip.frames(), 2);
        assert_eq!(clip.channels, 2);
    }

    #[test]
    fn test_frame_slice_clamps_to_track() {
        let track = ramp_track(1000, 1, 10);
        assert_eq!(track.frame_slice(8..20), &[8.0, 9.0]);
        assert!(track.frame_slice(12..20).is_empty());
    }
}
