//! Separation configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for vocal separation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Which model to use
    pub model: ModelType,

    /// Whether to attempt GPU acceleration
    pub use_gpu: bool,

    /// Segment length in seconds for inference (affects memory usage)
    pub segment_length_secs: f64,

    /// Fraction of each segment shared with its neighbour (0.0 to 0.5)
    pub overlap: f32,

    /// Model cache override; `None` uses `~/.cache/voxcut/models`
    pub cache_dir: Option<PathBuf>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            model: ModelType::Demucs4Stems,
            use_gpu: true, // Try GPU, fall back to CPU
            segment_length_secs: 10.0,
            overlap: 0.25,
            cache_dir: None,
        }
    }
}

impl SeparationConfig {
    /// Validate configuration values
    pub fn validate(&mut self) {
        if !self.segment_length_secs.is_finite() {
            self.segment_length_secs = Self::default().segment_length_secs;
        }
        // Clamp segment length to reasonable range
        self.segment_length_secs = self.segment_length_secs.clamp(5.0, 60.0);

        if !self.overlap.is_finite() {
            self.overlap = Self::default().overlap;
        }
        self.overlap = self.overlap.clamp(0.0, 0.5);
    }
}

/// Available separation models
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    /// Hybrid Transformer Demucs, 4 stems (drums, bass, other, vocals)
    #[default]
    #[value(name = "demucs4-stems")]
    Demucs4Stems,

    /// Hybrid Transformer Demucs, 6 stems (+ guitar, piano)
    #[value(name = "demucs6-stems")]
    Demucs6Stems,
}

impl ModelType {
    /// Display name for status text
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Demucs4Stems => "Demucs 4-stem",
            Self::Demucs6Stems => "Demucs 6-stem",
        }
    }

    /// Model filename (must match the name used during ONNX export, since external data
    /// files reference it by name)
    pub fn filename(&self) -> &'static str {
        match self {
            Self::Demucs4Stems => "htdemucs.onnx",
            Self::Demucs6Stems => "htdemucs_6s.onnx",
        }
    }

    /// Download URL (GitHub releases)
    pub fn download_url(&self) -> &'static str {
        match self {
            Self::Demucs4Stems => {
                "https://github.com/dataO1/Mesh/releases/download/models/htdemucs.onnx"
            }
            Self::Demucs6Stems => {
                "https://github.com/dataO1/Mesh/releases/download/models/htdemucs_6s.onnx"
            }
        }
    }

    /// Whether the weights live in a separate `.onnx.data` file
    pub fn has_external_data(&self) -> bool {
        true
    }

    /// Filename of the external weights file
    pub fn data_filename(&self) -> String {
        format!("{}.data", self.filename())
    }

    /// Download URL of the external weights file
    pub fn data_download_url(&self) -> String {
        format!("{}.data", self.download_url())
    }

    /// All available models
    pub fn all() -> &'static [Self] {
        &[Self::Demucs4Stems, Self::Demucs6Stems]
    }

    /// Number of output stems
    pub fn stem_count(&self) -> usize {
        match self {
            Self::Demucs4Stems => 4,
            Self::Demucs6Stems => 6,
        }
    }

    /// Position of the vocals stem in the model output
    ///
    /// htdemucs order: drums=0, bass=1, other=2, vocals=3 (then guitar, piano)
    pub fn vocals_index(&self) -> usize {
        3
    }

    /// Sample rate the model was trained at
    pub fn sample_rate(&self) -> u32 {
        44_100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_clamps_values() {
        let mut config = SeparationConfig {
            segment_length_secs: 1.0,
            overlap: 0.9,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.segment_length_secs, 5.0);
        assert_eq!(config.overlap, 0.5);

        config.segment_length_secs = f64::NAN;
        config.validate();
        assert_eq!(config.segment_length_secs, 10.0);
    }

    #[test]
    fn test_model_yaml_names() {
        let parsed: ModelType = serde_yaml::from_str("demucs6-stems").unwrap();
        assert_eq!(parsed, ModelType::Demucs6Stems);
        assert_eq!(
            serde_yaml::to_string(&ModelType::Demucs4Stems).unwrap().trim(),
            "demucs4-stems"
        );
    }

    #[test]
    fn test_vocals_stem_is_within_output() {
        for model in ModelType::all() {
            assert!(model.vocals_index() < model.stem_count());
            assert!(model.data_filename().ends_with(".onnx.data"));
        }
    }
}
