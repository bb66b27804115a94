//! Sample rate conversion to and from the model rate

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::{Result, SeparationError};

/// Upper bound on flush calls when draining the resampler
const MAX_FLUSHES: usize = 64;

/// Resample interleaved audio, returning exactly `round(frames * to / from)`
/// frames
///
/// The resampler's filter delay is trimmed from the front, so the output
/// lines up with the input in time.
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>> {
    let channels = channels.max(1);
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(SeparationError::ResampleFailed(format!(
            "invalid rates {} -> {}",
            from_rate, to_rate
        )));
    }

    let frames = samples.len() / channels;
    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (frames as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, channels)
        .map_err(|e| {
            SeparationError::ResampleFailed(format!("Failed to create resampler: {}", e))
        })?;
    let delay = resampler.output_delay();

    let mut channel_buffers: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for (i, &sample) in samples.iter().enumerate() {
        channel_buffers[i % channels].push(sample);
    }

    let mut resampled = resampler
        .process(&channel_buffers, None)
        .map_err(|e| SeparationError::ResampleFailed(e.to_string()))?;

    // Push zeros through until the delayed tail is out
    let mut flushes = 0;
    while resampled[0].len() < delay + expected && flushes < MAX_FLUSHES {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| SeparationError::ResampleFailed(e.to_string()))?;
        for (out, more) in resampled.iter_mut().zip(tail) {
            out.extend(more);
        }
        flushes += 1;
    }

    let mut output = Vec::with_capacity(expected * channels);
    for frame_idx in delay..delay + expected {
        for channel in &resampled {
            output.push(channel.get(frame_idx).copied().unwrap_or(0.0));
        }
    }

    log::debug!(
        "resample_interleaved: {} frames @ {} Hz -> {} frames @ {} Hz (delay {})",
        frames,
        from_rate,
        expected,
        to_rate,
        delay
    );
    Ok(output)
}
