//! Run directory creation and file writing

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use hound::{WavSpec, WavWriter};
use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, Quality};

use super::{AudioFormat, OutputConfig, SampleFormat};
use crate::error::{ProcessingError, Result};
use crate::manifest::ProcessingManifest;
use crate::types::Track;

/// Highest disambiguating suffix tried before giving up
const MAX_DIR_SUFFIX: u32 = 999;

/// Paths produced by one successful write
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenOutput {
    /// Run directory
    pub dir: PathBuf,
    /// Combined track
    pub audio_path: PathBuf,
    /// Manifest text file
    pub manifest_path: PathBuf,
}

/// RAII guard for a freshly created run directory - removes it on drop
/// unless disarmed.
///
/// Keeps failed or cancelled writes from leaving half-filled directories
/// behind, including on early returns.
struct RunDirGuard {
    path: PathBuf,
    disarmed: bool,
}

impl RunDirGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, disarmed: false }
    }

    /// Keep the directory (call once every file is written)
    fn disarm(&mut self) {
        self.disarmed = true;
    }
}

impl Drop for RunDirGuard {
    fn drop(&mut self) {
        if !self.disarmed {
            log::warn!("Removing incomplete output directory {:?}", self.path);
            if let Err(e) = fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!(
                        "Failed to remove incomplete output directory {:?}: {}",
                        self.path,
                        e
                    );
                }
            }
        }
    }
}

/// Persists a combined track and its manifest
#[derive(Debug, Clone)]
pub struct OutputWriter {
    config: OutputConfig,
}

impl OutputWriter {
    pub fn new(mut config: OutputConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Directory name for a run before collision handling
    ///
    /// `{source-basename}_{YYYYmmdd_HHMMSS}`
    pub fn run_dir_name(manifest: &ProcessingManifest) -> String {
        format!(
            "{}_{}",
            manifest.source_basename(),
            manifest.processed_at().format("%Y%m%d_%H%M%S")
        )
    }

    /// Write the track and manifest into a fresh run directory
    ///
    /// On any failure the run directory is removed and `WriteError` is
    /// returned; nothing is retried.
    pub fn write(&self, output: &Track, manifest: &ProcessingManifest) -> Result<WrittenOutput> {
        let root = &self.config.root_dir;
        fs::create_dir_all(root).map_err(|e| ProcessingError::write_error(root, e))?;

        let dir = create_fresh_dir(root, &Self::run_dir_name(manifest))?;
        let mut guard = RunDirGuard::new(dir.clone());
        log::info!("OutputWriter: created {:?}", dir);

        let audio_path = dir.join(self.config.audio_file_name());
        let encoding = match self.config.format {
            AudioFormat::Mp3 => {
                write_mp3(&audio_path, output, self.config.mp3_bitrate_kbps)
                    .map_err(|e| ProcessingError::write_error(&audio_path, e))?;
                format!("MP3 {} kbps", self.config.mp3_bitrate_kbps)
            }
            AudioFormat::Wav => {
                write_wav(&audio_path, output, self.config.sample_format)
                    .map_err(|e| ProcessingError::write_error(&audio_path, e))?;
                self.config.sample_format.display_name().to_string()
            }
        };
        log::info!(
            "OutputWriter: wrote {} frames ({}) to {:?}",
            output.frames(),
            encoding,
            audio_path
        );

        let manifest_path = dir.join(&self.config.manifest_file_name);
        write_text(&manifest_path, &manifest.render())
            .map_err(|e| ProcessingError::write_error(&manifest_path, e))?;
        log::info!("OutputWriter: wrote manifest to {:?}", manifest_path);

        guard.disarm();
        Ok(WrittenOutput {
            dir,
            audio_path,
            manifest_path,
        })
    }
}

/// Create `root/name`, or `root/name_2`, `root/name_3`, ... if taken
///
/// `create_dir` (not `create_dir_all`) makes the claim atomic, so two runs
/// finishing in the same second never share a directory.
fn create_fresh_dir(root: &Path, name: &str) -> Result<PathBuf> {
    let mut candidate = root.join(name);
    for suffix in 2..=MAX_DIR_SUFFIX + 1 {
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                log::debug!("create_fresh_dir: {:?} exists, trying next suffix", candidate);
                candidate = root.join(format!("{}_{}", name, suffix));
            }
            Err(e) => return Err(ProcessingError::write_error(&candidate, e)),
        }
    }
    Err(ProcessingError::write_error(
        root.join(name),
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free output directory name",
        ),
    ))
}

fn hound_to_io(e: hound::Error) -> std::io::Error {
    match e {
        hound::Error::IoError(io) => io,
        other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
    }
}

/// Write interleaved f32 samples as a WAV file
fn write_wav(path: &Path, track: &Track, format: SampleFormat) -> std::io::Result<()> {
    let spec = WavSpec {
        channels: track.channels(),
        sample_rate: track.sample_rate(),
        bits_per_sample: format.bits_per_sample(),
        sample_format: match format {
            SampleFormat::Float32 => hound::SampleFormat::Float,
            SampleFormat::Int16 | SampleFormat::Int24 => hound::SampleFormat::Int,
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    match format {
        SampleFormat::Int16 => {
            for &sample in track.samples() {
                let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                writer.write_sample(value).map_err(hound_to_io)?;
            }
        }
        SampleFormat::Int24 => {
            for &sample in track.samples() {
                let value = (sample.clamp(-1.0, 1.0) * 8_388_607.0) as i32;
                writer.write_sample(value).map_err(hound_to_io)?;
            }
        }
        SampleFormat::Float32 => {
            for &sample in track.samples() {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
    }
    writer.finalize().map_err(hound_to_io)
}

fn lame_error(what: &str, e: impl std::fmt::Debug) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("LAME {} failed: {:?}", what, e))
}

fn lame_bitrate(kbps: u32) -> Bitrate {
    match kbps {
        0..=96 => Bitrate::Kbps96,
        97..=112 => Bitrate::Kbps112,
        113..=128 => Bitrate::Kbps128,
        129..=160 => Bitrate::Kbps160,
        161..=192 => Bitrate::Kbps192,
        193..=224 => Bitrate::Kbps224,
        225..=256 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// Encode the track as constant-bitrate MP3
///
/// LAME takes at most two channels: mono stays mono, channels beyond L/R
/// are dropped.
fn write_mp3(path: &Path, track: &Track, bitrate_kbps: u32) -> std::io::Result<()> {
    let channels = track.channels() as usize;

    let mut builder = Builder::new().ok_or_else(|| lame_error("init", "no encoder"))?;
    builder
        .set_num_channels(channels.min(2) as u8)
        .map_err(|e| lame_error("set channels", e))?;
    builder
        .set_sample_rate(track.sample_rate())
        .map_err(|e| lame_error("set sample rate", e))?;
    builder
        .set_brate(lame_bitrate(bitrate_kbps))
        .map_err(|e| lame_error("set bitrate", e))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| lame_error("set quality", e))?;
    let mut encoder = builder.build().map_err(|e| lame_error("build", e))?;

    let to_i16 = |sample: f32| (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
    let frames = track.frames();
    let mut left: Vec<i16> = Vec::with_capacity(frames);
    let mut right: Vec<i16> = Vec::with_capacity(frames);
    for frame in track.samples().chunks_exact(channels) {
        left.push(to_i16(frame[0]));
        right.push(to_i16(frame[channels.min(2) - 1]));
    }

    let capacity = mp3lame_encoder::max_required_buffer_size(frames);
    let mut mp3: Vec<u8> = Vec::with_capacity(capacity);
    let encoded = encoder
        .encode(DualPcm { left: &left, right: &right }, mp3.spare_capacity_mut())
        .map_err(|e| lame_error("encode", e))?;
    // SAFETY: the encoder initialised `encoded` bytes of spare capacity
    unsafe {
        mp3.set_len(encoded);
    }

    mp3.reserve(7200);
    let flushed = encoder
        .flush::<FlushNoGap>(mp3.spare_capacity_mut())
        .map_err(|e| lame_error("flush", e))?;
    // SAFETY: as above, for the flushed tail
    unsafe {
        mp3.set_len(mp3.len() + flushed);
    }

    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(&mp3)?;
    file.flush()
}

fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(text.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::TimeRange;
    use chrono::{Local, TimeZone};

    fn manifest() -> ProcessingManifest {
        let at = Local.with_ymd_and_hms(2026, 10, 16, 14, 3, 27).unwrap();
        ProcessingManifest::new(vec![TimeRange::new(1.0, 2.0).unwrap()], "song.mp3", at)
    }

    fn track() -> Track {
        let samples = (0..200).map(|i| (i as f32 / 200.0) - 0.5).collect();
        Track::new(100, 2, samples).unwrap()
    }

    fn writer(root: &Path, format: SampleFormat) -> OutputWriter {
        OutputWriter::new(OutputConfig {
            root_dir: root.to_path_buf(),
            format: AudioFormat::Wav,
            sample_format: format,
            ..Default::default()
        })
    }

    fn sine_track(rate: u32, channels: u16, secs: f64) -> Track {
        let frames = (rate as f64 * secs) as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let phase = i as f32 * 440.0 * std::f32::consts::TAU / rate as f32;
                std::iter::repeat(0.5 * phase.sin()).take(channels as usize)
            })
            .collect();
        Track::new(rate, channels, samples).unwrap()
    }

    /// Offset of the first MPEG audio frame header (11 sync bits)
    fn first_frame_sync(bytes: &[u8]) -> Option<usize> {
        bytes.windows(2).position(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0)
    }

    #[test]
    fn test_run_dir_name() {
        assert_eq!(OutputWriter::run_dir_name(&manifest()), "song_20261016_140327");
    }

    #[test]
    fn test_write_creates_audio_and_manifest() {
        let root = tempfile::tempdir().unwrap();
        let written = writer(root.path(), SampleFormat::Int16)
            .write(&track(), &manifest())
            .unwrap();

        assert_eq!(written.dir, root.path().join("song_20261016_140327"));
        assert!(written.audio_path.ends_with("output.wav"));

        let reader = hound::WavReader::open(&written.audio_path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 100);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.len(), 200);

        let text = fs::read_to_string(&written.manifest_path).unwrap();
        assert!(text.starts_with("Vocal Removal Sections:"));
        assert!(text.contains("Section 1: 00:01 to 00:02"));
    }

    #[test]
    fn test_default_writes_mp3() {
        let root = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(OutputConfig {
            root_dir: root.path().to_path_buf(),
            ..Default::default()
        });
        let written = writer
            .write(&sine_track(44_100, 2, 1.0), &manifest())
            .unwrap();

        assert!(written.audio_path.ends_with("output.mp3"));
        let bytes = fs::read(&written.audio_path).unwrap();
        // One second at 128 kbps is about 16 KB
        assert!(bytes.len() > 8_000 && bytes.len() < 40_000, "{} bytes", bytes.len());
        assert!(first_frame_sync(&bytes).is_some());
        assert!(written.manifest_path.exists());
    }

    #[test]
    fn test_mp3_bitrate_changes_size_and_mono_encodes() {
        let root = tempfile::tempdir().unwrap();
        let encode = |kbps: u32, channels: u16| {
            let path = root.path().join(format!("{}_{}.mp3", kbps, channels));
            write_mp3(&path, &sine_track(44_100, channels, 2.0), kbps).unwrap();
            fs::read(&path).unwrap().len()
        };

        assert!(encode(320, 2) > encode(96, 2));
        assert!(encode(128, 1) > 0);
    }

    #[test]
    fn test_lame_bitrate_mapping() {
        assert!(matches!(lame_bitrate(96), Bitrate::Kbps96));
        assert!(matches!(lame_bitrate(128), Bitrate::Kbps128));
        assert!(matches!(lame_bitrate(150), Bitrate::Kbps160));
        assert!(matches!(lame_bitrate(320), Bitrate::Kbps320));
    }

    #[test]
    fn test_float_output_preserves_samples() {
        let root = tempfile::tempdir().unwrap();
        let written = writer(root.path(), SampleFormat::Float32)
            .write(&track(), &manifest())
            .unwrap();

        let mut reader = hound::WavReader::open(&written.audio_path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, track().samples());
    }

    #[test]
    fn test_collision_appends_suffix() {
        let root = tempfile::tempdir().unwrap();
        let writer = writer(root.path(), SampleFormat::Int16);

        let first = writer.write(&track(), &manifest()).unwrap();
        let second = writer.write(&track(), &manifest()).unwrap();
        let third = writer.write(&track(), &manifest()).unwrap();

        assert_eq!(first.dir, root.path().join("song_20261016_140327"));
        assert_eq!(second.dir, root.path().join("song_20261016_140327_2"));
        assert_eq!(third.dir, root.path().join("song_20261016_140327_3"));
    }

    #[test]
    fn test_unwritable_root_is_write_error() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let err = writer(&blocker, SampleFormat::Int16)
            .write(&track(), &manifest())
            .unwrap_err();
        assert!(matches!(err, ProcessingError::WriteError { .. }));
    }

    #[test]
    fn test_guard_removes_directory_unless_disarmed() {
        let root = tempfile::tempdir().unwrap();

        let doomed = root.path().join("doomed");
        fs::create_dir(&doomed).unwrap();
        fs::write(doomed.join("partial.wav"), b"RIFF").unwrap();
        drop(RunDirGuard::new(doomed.clone()));
        assert!(!doomed.exists());

        let kept = root.path().join("kept");
        fs::create_dir(&kept).unwrap();
        let mut guard = RunDirGuard::new(kept.clone());
        guard.disarm();
        drop(guard);
        assert!(kept.exists());
    }
}
