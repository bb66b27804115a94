//! Global configuration for voxcut
//!
//! Configuration is stored as YAML in the user config directory.
//! Default location: ~/.config/voxcut/config.yaml
//!
//! ```yaml
//! separation:
//!   model: demucs4-stems
//!   use_gpu: true
//!   segment_length_secs: 10.0
//!   overlap: 0.25
//! pipeline:
//!   length_tolerance_frames: 256
//!   max_parallel_sections: 1
//! output:
//!   root_dir: output
//!   format: mp3
//!   mp3_bitrate_kbps: 128
//!   sample_format: int16
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use voxcut_core::output::OutputConfig;
use voxcut_core::pipeline::PipelineOptions;

use crate::separation::SeparationConfig;

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model and inference settings
    pub separation: SeparationConfig,
    /// Reconstruction settings
    pub pipeline: PipelineOptions,
    /// Where and how results are written
    pub output: OutputConfig,
}

impl Config {
    /// Clamp every section to its valid ranges
    pub fn validate(&mut self) {
        self.separation.validate();
        self.pipeline.validate();
        self.output.validate();
    }
}

/// Default config file path
pub fn default_config_path() -> PathBuf {
    voxcut_core::config::default_config_path(CONFIG_FILE_NAME)
}

/// Load and validate configuration; missing or broken files give defaults
pub fn load_config(path: &Path) -> Config {
    let mut config: Config = voxcut_core::config::load_config(path);
    config.validate();
    log::info!(
        "load_config: model={}, parallel={}, output={:?}",
        config.separation.model.display_name(),
        config.pipeline.max_parallel_sections,
        config.output.root_dir
    );
    config
}

/// Save configuration to a YAML file
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    voxcut_core::config::save_config(config, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separation::ModelType;
    use voxcut_core::output::SampleFormat;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.separation.model, ModelType::Demucs4Stems);
        assert_eq!(config.pipeline.max_parallel_sections, 1);
        assert_eq!(config.output.root_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.separation.use_gpu = false;
        config.pipeline.max_parallel_sections = 4;
        config.output.sample_format = SampleFormat::Float32;
        save_config(&config, &path).unwrap();

        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_partial_yaml_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "separation:\n  segment_length_secs: 120\npipeline:\n  max_parallel_sections: 99\n",
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.separation.segment_length_secs, 60.0);
        assert_eq!(config.pipeline.max_parallel_sections, 16);
        assert_eq!(config.output, OutputConfig::default());
    }
}
