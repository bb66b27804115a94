//! ONNX Runtime Demucs backend
//!
//! Turns a clip into its instrumental:
//!
//! 1. Convert to stereo and resample to the model rate
//! 2. Normalise by the clip's mono mean and standard deviation
//! 3. Run the model over overlapping segments
//! 4. De-normalise every stem and sum all but vocals
//! 5. Resample back and restore the clip's channel layout

use std::sync::{Mutex, MutexGuard};

use ndarray::{Array2, Array3, ArrayView2, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "directml")]
use ort::execution_providers::DirectMLExecutionProvider;

use voxcut_core::separation::SeparationAdapter;
use voxcut_core::Clip;

use super::config::{ModelType, SeparationConfig};
use super::error::{Result, SeparationError};
use super::model::{log_progress, ModelManager};
use super::resample::resample_interleaved;
use super::segment::{separate_segmented, SegmentPlan};

/// Backend using ONNX Runtime directly via the `ort` crate
///
/// The session sits behind a mutex: ONNX Runtime needs `&mut` to run, so
/// concurrent `separate` calls take turns on the model.
pub struct OrtBackend {
    config: SeparationConfig,
    models: ModelManager,
    session: Mutex<Option<Session>>,
}

impl OrtBackend {
    pub fn new(mut config: SeparationConfig) -> Self {
        config.validate();
        let models = ModelManager::for_config(&config);
        log::info!(
            "OrtBackend initialized: model={}, use_gpu={}, segment={}s, overlap={}",
            config.model.display_name(),
            config.use_gpu,
            config.segment_length_secs,
            config.overlap
        );
        Self {
            config,
            models,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    pub fn model_manager(&self) -> &ModelManager {
        &self.models
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<Session>>> {
        self.session
            .lock()
            .map_err(|_| SeparationError::SeparationFailed("session lock poisoned".to_string()))
    }

    fn open_session(&self) -> Result<Session> {
        let model_path = self
            .models
            .ensure_model(self.config.model, Some(log_progress(self.config.model)))?;
        if !model_path.exists() {
            return Err(SeparationError::ModelNotFound(model_path.display().to_string()));
        }

        log::info!("Loading ONNX model from {:?}", model_path);
        #[allow(unused_mut)]
        let mut builder = Session::builder()
            .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?;

        #[cfg(feature = "cuda")]
        if self.config.use_gpu {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?;
        }
        #[cfg(feature = "directml")]
        if self.config.use_gpu {
            builder = builder
                .with_execution_providers([DirectMLExecutionProvider::default().build()])
                .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?;
        }

        builder
            .commit_from_file(&model_path)
            .map_err(|e| {
                SeparationError::BackendInitFailed(format!("Failed to load ONNX model: {}", e))
            })
    }

    fn separate_clip(&self, clip: &Clip) -> Result<Clip> {
        let mut guard = self.lock_session()?;
        let session = guard.as_mut().ok_or(SeparationError::NotLoaded)?;

        let model = self.config.model;
        let segment_frames =
            (self.config.segment_length_secs * model.sample_rate() as f64) as usize;
        let plan = SegmentPlan::new(segment_frames, self.config.overlap);

        instrumental_for_clip(clip, model, plan, |chunk| run_model(session, chunk, model))
    }
}

impl SeparationAdapter for OrtBackend {
    fn load(&mut self) -> anyhow::Result<()> {
        let session = self.open_session()?;
        *self.lock_session()? = Some(session);
        log::info!("OrtBackend: model {} ready", self.config.model.display_name());
        Ok(())
    }

    fn separate(&self, clip: &Clip) -> anyhow::Result<Clip> {
        Ok(self.separate_clip(clip)?)
    }

    fn release(&mut self) {
        match self.session.get_mut() {
            Ok(session) => *session = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        log::info!("OrtBackend: model released");
    }

    fn name(&self) -> &'static str {
        "ONNX Runtime"
    }

    fn is_loaded(&self) -> bool {
        self.session.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

/// Run one segment through the session: `[2, n]` in, `[stems, 2, n]` out
fn run_model(
    session: &mut Session,
    chunk: ArrayView2<f32>,
    model: ModelType,
) -> Result<Array3<f32>> {
    let (channels, frames) = chunk.dim();
    let input = chunk.to_owned().insert_axis(Axis(0));

    let input_tensor = Tensor::from_array(input).map_err(|e| {
        SeparationError::SeparationFailed(format!("Failed to create input tensor: {}", e))
    })?;

    let outputs = session
        .run(ort::inputs!["input" => input_tensor])
        .map_err(|e| SeparationError::SeparationFailed(format!("Inference failed: {}", e)))?;

    let output = outputs
        .iter()
        .next()
        .ok_or_else(|| SeparationError::SeparationFailed("No output tensor".to_string()))?
        .1;

    let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
        SeparationError::SeparationFailed(format!("Failed to extract output: {}", e))
    })?;
    let output_shape: Vec<i64> = shape.iter().copied().collect();

    // Expected shape: [1, stems, 2, N]
    let stems = model.stem_count();
    let expected = [1, stems as i64, channels as i64, frames as i64];
    if output_shape != expected {
        return Err(SeparationError::SeparationFailed(format!(
            "Unexpected output shape: {:?}, expected {:?}",
            output_shape, expected
        )));
    }

    Array3::from_shape_vec((stems, channels, frames), data.to_vec())
        .map_err(|e| SeparationError::SeparationFailed(e.to_string()))
}

/// The whole per-clip pipeline around an arbitrary stem model
///
/// `model` sees normalised `[2, n]` segments at the model rate and returns
/// `[stems, 2, n]`. The result has the clip's rate and channel count. After
/// two rate conversions its length can be a frame off; the pipeline
/// conforms it with [`conform_instrumental`](voxcut_core::separation::conform_instrumental).
pub fn instrumental_for_clip<F>(
    clip: &Clip,
    model: ModelType,
    plan: SegmentPlan,
    run: F,
) -> Result<Clip>
where
    F: FnMut(ArrayView2<f32>) -> Result<Array3<f32>>,
{
    if clip.is_empty() {
        return Err(SeparationError::SeparationFailed("empty clip".to_string()));
    }

    let stereo = to_stereo(&clip.samples, clip.channels as usize);
    let model_rate = model.sample_rate();
    let stereo = resample_interleaved(&stereo, 2, clip.sample_rate, model_rate)?;
    let mut wav = deinterleave_stereo(&stereo);

    let (mean, std) = normalisation(&wav);
    wav.mapv_inplace(|x| (x - mean) / std);

    let sources = separate_segmented(wav.view(), plan, run)?;
    if sources.len_of(Axis(0)) != model.stem_count() {
        return Err(SeparationError::SeparationFailed(format!(
            "model returned {} stems, expected {}",
            sources.len_of(Axis(0)),
            model.stem_count()
        )));
    }

    let mut instrumental = Array2::<f32>::zeros(wav.dim());
    for (stem, source) in sources.axis_iter(Axis(0)).enumerate() {
        if stem != model.vocals_index() {
            instrumental += &source.mapv(|x| x * std + mean);
        }
    }

    let interleaved: Vec<f32> = instrumental.t().iter().copied().collect();
    let back = resample_interleaved(&interleaved, 2, model_rate, clip.sample_rate)?;
    let samples = from_stereo(&back, clip.channels as usize);

    Ok(Clip {
        sample_rate: clip.sample_rate,
        channels: clip.channels,
        samples,
    })
}

/// Mean and (sample) standard deviation of the mono mix
///
/// A silent clip has no spread; its deviation is taken as 1.
fn normalisation(wav: &Array2<f32>) -> (f32, f32) {
    let mono = wav.mean_axis(Axis(0)).unwrap_or_else(|| ndarray::Array1::zeros(0));
    let n = mono.len();
    if n == 0 {
        return (0.0, 1.0);
    }
    let mean = mono.sum() / n as f32;
    let var = if n > 1 {
        mono.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / (n - 1) as f32
    } else {
        0.0
    };
    let std = var.sqrt();
    (mean, if std > 1e-8 { std } else { 1.0 })
}

/// Interleaved audio of any channel count to interleaved stereo
///
/// Mono is duplicated; more than two channels keep the first two.
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        _ => samples
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Interleaved stereo back to `channels`
///
/// Mono takes the average of left and right; extra channels beyond two
/// carry that average as well.
pub fn from_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        2 => samples.to_vec(),
        _ => {
            let mut out = Vec::with_capacity(samples.len() / 2 * channels);
            for frame in samples.chunks_exact(2) {
                let mid = (frame[0] + frame[1]) * 0.5;
                if channels == 1 {
                    out.push(mid);
                } else {
                    out.push(frame[0]);
                    out.push(frame[1]);
                    out.extend(std::iter::repeat(mid).take(channels - 2));
                }
            }
            out
        }
    }
}

fn deinterleave_stereo(samples: &[f32]) -> Array2<f32> {
    let frames = samples.len() / 2;
    Array2::from_shape_fn((2, frames), |(c, i)| samples[i * 2 + c])
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcut_core::separation::conform_instrumental;

    /// Stand-in for Demucs: every stem is a quarter of the input, vocals
    /// included, so the instrumental is three quarters of the (normalised)
    /// input
    fn quarter_model(input: ArrayView2<f32>) -> Result<Array3<f32>> {
        let (channels, frames) = input.dim();
        let mut out = Array3::zeros((4, channels, frames));
        for k in 0..4 {
            out.index_axis_mut(Axis(0), k).assign(&(&input * 0.25));
        }
        Ok(out)
    }

    fn instrumental(clip: &Clip, model: ModelType) -> Result<Clip> {
        instrumental_for_clip(clip, model, SegmentPlan::new(44_100, 0.25), quarter_model)
    }

    fn sine_clip(rate: u32, channels: u16, frames: usize) -> Clip {
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let v = (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5;
            for _ in 0..channels {
                samples.push(v);
            }
        }
        Clip {
            sample_rate: rate,
            channels,
            samples,
        }
    }

    #[test]
    fn test_channel_conversion() {
        assert_eq!(to_stereo(&[1.0, 2.0], 1), vec![1.0, 1.0, 2.0, 2.0]);
        assert_eq!(to_stereo(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3), vec![1.0, 2.0, 4.0, 5.0]);

        assert_eq!(from_stereo(&[1.0, 3.0], 1), vec![2.0]);
        assert_eq!(from_stereo(&[1.0, 3.0], 2), vec![1.0, 3.0]);
        assert_eq!(from_stereo(&[1.0, 3.0], 4), vec![1.0, 3.0, 2.0, 2.0]);
    }

    #[test]
    fn test_normalisation_of_silence() {
        let wav = Array2::<f32>::zeros((2, 100));
        assert_eq!(normalisation(&wav), (0.0, 1.0));
    }

    #[test]
    fn test_instrumental_drops_vocals_stem() {
        let clip = sine_clip(44_100, 2, 4410);
        let out = instrumental(&clip, ModelType::Demucs4Stems).unwrap();

        assert_eq!(out.frames(), clip.frames());
        assert_eq!(out.channels, 2);
        let (mean, _) = normalisation(&deinterleave_stereo(&clip.samples));
        // Each kept stem adds back the mean once
        for (a, b) in clip.samples.iter().zip(&out.samples) {
            let expected = 0.75 * (a - mean) + 3.0 * mean;
            assert!((expected - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mono_clip_at_other_rate_keeps_layout() {
        let clip = sine_clip(22_050, 1, 2205);
        let out = instrumental(&clip, ModelType::Demucs4Stems).unwrap();
        assert_eq!(out.sample_rate, 22_050);
        assert_eq!(out.channels, 1);
        assert_eq!(out.frames(), 2205);
    }

    #[test]
    fn test_resampling_drift_is_left_to_the_pipeline() {
        // 80 frames at 48 kHz is 73.5 at 44.1 kHz; rounding either way
        // comes back a frame off
        let clip = sine_clip(48_000, 2, 80);
        let out = instrumental(&clip, ModelType::Demucs4Stems).unwrap();
        assert_eq!((out.frames() as i64 - 80).abs(), 1);

        let conformed = conform_instrumental(&clip, out, 256).unwrap();
        assert_eq!(conformed.frames(), 80);
    }

    #[test]
    fn test_long_clip_is_segmented() {
        let clip = sine_clip(44_100, 2, 20_000);
        let mut calls = 0;
        let plan = SegmentPlan::new(4096, 0.25);
        let out = instrumental_for_clip(&clip, ModelType::Demucs4Stems, plan, |chunk| {
            calls += 1;
            quarter_model(chunk)
        })
        .unwrap();
        assert!(calls > 1);
        assert_eq!(out.frames(), 20_000);
    }

    #[test]
    fn test_wrong_stem_count_is_error() {
        let clip = sine_clip(44_100, 2, 1000);
        let err = instrumental(&clip, ModelType::Demucs6Stems).unwrap_err();
        assert!(matches!(err, SeparationError::SeparationFailed(_)));
    }

    #[test]
    fn test_backend_starts_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let backend = OrtBackend::new(SeparationConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        assert!(!backend.is_loaded());
        assert_eq!(backend.name(), "ONNX Runtime");

        let clip = sine_clip(44_100, 2, 100);
        assert!(backend.separate(&clip).is_err());
    }
}
