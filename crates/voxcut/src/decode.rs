//! Audio file decoding (Symphonia)

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use voxcut_core::Track;

/// Errors raised while turning a file into a [`Track`]
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read audio file: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio decoded from {0}")]
    Empty(PathBuf),

    #[error(transparent)]
    InvalidTrack(#[from] voxcut_core::ProcessingError),
}

/// Decode an audio file to an interleaved f32 track
///
/// Undecodable packets are skipped with a warning; a file that yields no
/// audio at all is an error.
pub fn decode_file(path: &Path) -> Result<Track, DecodeError> {
    let file = File::open(path).map_err(|e| DecodeError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;

    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut buf_frames: u64 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("decode_file: error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode_file: error decoding packet: {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        // Packets can grow (e.g. VBR); reallocate when one doesn't fit
        let needed = decoded.capacity() as u64;
        if sample_buf.is_none() || needed > buf_frames {
            sample_buf = Some(SampleBuffer::new(needed, spec));
            buf_frames = needed;
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let sample_rate = sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("Unknown sample rate".to_string()))?;
    let channels = channels.unwrap_or(2).max(1);
    if samples.is_empty() {
        return Err(DecodeError::Empty(path.to_path_buf()));
    }

    // A truncated final packet can leave a partial frame
    let whole = samples.len() - samples.len() % channels as usize;
    samples.truncate(whole);

    let track = Track::new(sample_rate, channels, samples)?;
    log::info!(
        "decode_file: {:?} -> {:.2}s, {} Hz, {} ch",
        path,
        track.duration_secs(),
        track.sample_rate(),
        track.channels()
    );
    Ok(track)
}
