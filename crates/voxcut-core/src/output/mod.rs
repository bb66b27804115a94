//! Output persistence
//!
//! Each run gets its own fresh directory under the output root:
//!
//! ```text
//! output/
//!   my song_20261016_140327/
//!     output.mp3          combined track (output.wav in WAV mode)
//!     section_info.txt    manifest
//!   my song_20261016_140327_2/   same second, second run
//! ```
//!
//! A directory is only left behind when every file in it was written.

mod writer;

pub use writer::{OutputWriter, WrittenOutput};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lowest and highest MP3 bitrates accepted (kbps)
pub const MP3_BITRATE_RANGE: (u32, u32) = (96, 320);

/// Output configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives one sub-directory per run
    pub root_dir: PathBuf,
    /// Container of the combined track
    pub format: AudioFormat,
    /// Constant bitrate for MP3 output (kbps)
    pub mp3_bitrate_kbps: u32,
    /// Sample encoding for WAV output
    pub sample_format: SampleFormat,
    /// File name of the combined track without extension
    pub audio_file_stem: String,
    /// File name of the manifest inside the run directory
    pub manifest_file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("output"),
            format: AudioFormat::default(),
            mp3_bitrate_kbps: 128,
            sample_format: SampleFormat::default(),
            audio_file_stem: String::from("output"),
            manifest_file_name: String::from("section_info.txt"),
        }
    }
}

impl OutputConfig {
    /// File name of the combined track, e.g. `output.mp3`
    pub fn audio_file_name(&self) -> String {
        format!("{}.{}", self.audio_file_stem, self.format.extension())
    }

    /// Clamp the bitrate and replace empty or path-like file names with defaults
    pub fn validate(&mut self) {
        let (min_kbps, max_kbps) = MP3_BITRATE_RANGE;
        self.mp3_bitrate_kbps = self.mp3_bitrate_kbps.clamp(min_kbps, max_kbps);

        let defaults = Self::default();
        if !is_plain_file_name(&self.audio_file_stem) {
            log::warn!(
                "OutputConfig: invalid audio file name {:?}, using {:?}",
                self.audio_file_stem,
                defaults.audio_file_stem
            );
            self.audio_file_stem = defaults.audio_file_stem;
        }
        if !is_plain_file_name(&self.manifest_file_name) {
            log::warn!(
                "OutputConfig: invalid manifest file name {:?}, using {:?}",
                self.manifest_file_name,
                defaults.manifest_file_name
            );
            self.manifest_file_name = defaults.manifest_file_name;
        }
        if self.audio_file_name() == self.manifest_file_name {
            let defaults = Self::default();
            self.audio_file_stem = defaults.audio_file_stem;
            self.manifest_file_name = defaults.manifest_file_name;
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Audio container written for the combined track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1 Layer III through LAME
    #[default]
    Mp3,
    /// Uncompressed WAV in [`SampleFormat`]
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// WAV sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 16-bit integer PCM
    #[default]
    Int16,
    /// 24-bit integer PCM
    Int24,
    /// 32-bit IEEE float
    Float32,
}

impl SampleFormat {
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            Self::Int16 => 16,
            Self::Int24 => 24,
            Self::Float32 => 32,
        }
    }

    /// Display name for status text
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Int16 => "16-bit PCM",
            Self::Int24 => "24-bit PCM",
            Self::Float32 => "32-bit float",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_match_original_layout() {
        let config = OutputConfig::default();
        assert_eq!(config.root_dir, PathBuf::from("output"));
        assert_eq!(config.audio_file_name(), "output.mp3");
        assert_eq!(config.manifest_file_name, "section_info.txt");

        let wav = OutputConfig {
            format: AudioFormat::Wav,
            ..Default::default()
        };
        assert_eq!(wav.audio_file_name(), "output.wav");
    }

    #[test]
    fn test_validate_clamps_bitrate() {
        let mut config = OutputConfig {
            mp3_bitrate_kbps: 8,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.mp3_bitrate_kbps, 96);

        config.mp3_bitrate_kbps = 1000;
        config.validate();
        assert_eq!(config.mp3_bitrate_kbps, 320);
    }

    #[test]
    fn test_validate_rejects_path_like_names() {
        let mut config = OutputConfig {
            audio_file_stem: "../escape".to_string(),
            manifest_file_name: String::new(),
            ..Default::default()
        };
        config.validate();
        assert_eq!(config, OutputConfig::default());
    }

    #[test]
    fn test_validate_rejects_identical_names() {
        let mut config = OutputConfig {
            audio_file_stem: "notes".to_string(),
            manifest_file_name: "notes.mp3".to_string(),
            ..Default::default()
        };
        config.validate();
        assert_ne!(config.audio_file_name(), config.manifest_file_name);
    }

    #[test]
    fn test_format_yaml_names() {
        let yaml = "format: wav\nmp3_bitrate_kbps: 192\n";
        let parsed: OutputConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.format, AudioFormat::Wav);
        assert_eq!(parsed.mp3_bitrate_kbps, 192);
        assert_eq!(parsed.audio_file_stem, "output");
    }

    #[test]
    fn test_sample_format_yaml_names() {
        let yaml = serde_yaml::to_string(&SampleFormat::Float32).unwrap();
        assert_eq!(yaml.trim(), "float32");
        let parsed: SampleFormat = serde_yaml::from_str("int24").unwrap();
        assert_eq!(parsed, SampleFormat::Int24);
    }
}
