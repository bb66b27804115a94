//! Overlapping segment inference
//!
//! Long clips are cut into fixed-length segments that overlap their
//! neighbours. Each segment's stems are weighted with a triangular window
//! and summed; dividing by the summed weights hides the seams.
//!
//! ```text
//! segment 0  |/‾‾‾‾‾‾\|
//! segment 1       |/‾‾‾‾‾‾\|
//! segment 2            |/‾‾‾‾‾‾\|
//!            <----> stride
//! ```

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};

use super::error::{Result, SeparationError};

/// How a clip is cut for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Frames per model call
    pub segment_frames: usize,
    /// Frames between segment starts
    pub stride: usize,
}

impl SegmentPlan {
    /// `overlap` is the fraction of a segment shared with the next one
    pub fn new(segment_frames: usize, overlap: f32) -> Self {
        let segment_frames = segment_frames.max(1);
        let overlap_frames = (segment_frames as f32 * overlap.clamp(0.0, 0.5)) as usize;
        Self {
            segment_frames,
            stride: (segment_frames - overlap_frames).max(1),
        }
    }

    /// Start offsets of every segment for a clip of `frames`
    pub fn offsets(&self, frames: usize) -> Vec<usize> {
        if frames <= self.segment_frames {
            return vec![0];
        }
        // A segment is needed while the previous one stops short of the end
        (0..frames)
            .step_by(self.stride)
            .take_while(|&o| o == 0 || o - self.stride + self.segment_frames < frames)
            .collect()
    }
}

/// Triangular weights peaking in the middle, never zero
pub fn triangular_weights(len: usize) -> Array1<f32> {
    let half = len / 2;
    let weights: Vec<f32> = (1..=half).chain((1..=len - half).rev()).map(|w| w as f32).collect();
    let peak = weights.iter().copied().fold(1.0f32, f32::max);
    Array1::from(weights) / peak
}

/// Run `model` over a planar `[channels, frames]` input
///
/// `model` receives one `[channels, segment]` view and must return
/// `[stems, channels, segment]`. Segments shorter than the plan's length
/// (only the last one) are zero-padded before the call and trimmed after.
/// The result is `[stems, channels, frames]`.
pub fn separate_segmented<F>(
    input: ArrayView2<f32>,
    plan: SegmentPlan,
    mut model: F,
) -> Result<Array3<f32>>
where
    F: FnMut(ArrayView2<f32>) -> Result<Array3<f32>>,
{
    let (channels, frames) = input.dim();
    if frames == 0 {
        return Err(SeparationError::SeparationFailed("empty input".to_string()));
    }

    // Short clips go through in one call, unpadded
    if frames <= plan.segment_frames {
        let stems = model(input)?;
        check_shape(&stems, channels, frames)?;
        return Ok(stems);
    }

    let weights = triangular_weights(plan.segment_frames);
    let mut sum: Option<Array3<f32>> = None;
    let mut weight_sum = Array1::<f32>::zeros(frames);
    let offsets = plan.offsets(frames);
    log::debug!(
        "separate_segmented: {} frames in {} segments of {} (stride {})",
        frames,
        offsets.len(),
        plan.segment_frames,
        plan.stride
    );

    for offset in offsets {
        let end = (offset + plan.segment_frames).min(frames);
        let len = end - offset;

        let mut chunk = Array2::<f32>::zeros((channels, plan.segment_frames));
        chunk.slice_mut(s![.., ..len]).assign(&input.slice(s![.., offset..end]));

        let stems = model(chunk.view())?;
        check_shape(&stems, channels, plan.segment_frames)?;

        let acc =
            sum.get_or_insert_with(|| Array3::zeros((stems.len_of(Axis(0)), channels, frames)));
        if acc.len_of(Axis(0)) != stems.len_of(Axis(0)) {
            return Err(SeparationError::SeparationFailed(
                "stem count changed between segments".to_string(),
            ));
        }

        let w = weights.slice(s![..len]);
        let mut target = acc.slice_mut(s![.., .., offset..end]);
        target += &(&stems.slice(s![.., .., ..len]) * &w);
        let mut weight_target = weight_sum.slice_mut(s![offset..end]);
        weight_target += &w;
    }

    let mut out = sum.ok_or_else(|| SeparationError::SeparationFailed("no segments".to_string()))?;
    out /= &weight_sum;
    Ok(out)
}

fn check_shape(stems: &Array3<f32>, channels: usize, frames: usize) -> Result<()> {
    let (_, ch, len) = stems.dim();
    if ch != channels || len != frames {
        return Err(SeparationError::SeparationFailed(format!(
            "model returned {} channels x {} frames, expected {} x {}",
            ch, len, channels, frames
        )));
    }
    Ok(())
}
