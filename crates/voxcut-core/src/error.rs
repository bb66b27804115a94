//! Processing error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while editing sections or running a processing job
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Invalid range: end ({end:.3}s) must be after start ({start:.3}s)")]
    InvalidRange { start: f64, end: f64 },

    #[error("Section {start:.3}s to {end:.3}s is outside the track (0s to {duration:.3}s)")]
    OutOfBounds { start: f64, end: f64, duration: f64 },

    #[error("Sections overlap: one ends at {first_end:.3}s, the next starts at {second_start:.3}s")]
    OverlappingSections { first_end: f64, second_start: f64 },

    #[error("No section at index {index} ({len} sections)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No sections to process")]
    NoSections,

    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    #[error("Failed to load separation model: {0}")]
    ModelLoad(String),

    #[error("Separation failed for section {section}: {reason}")]
    SeparationFailed { section: usize, reason: String },

    #[error("Failed to write {path}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Processing worker stopped without a result")]
    WorkerLost,
}

impl ProcessingError {
    /// Single-line status text shown to the user for this error
    pub fn status_message(&self) -> String {
        match self {
            Self::Cancelled => "Processing cancelled".to_string(),
            Self::NoSections => "No sections to process!".to_string(),
            Self::WriteError { path, source } => {
                format!("Error during processing: failed to write {}: {}", path.display(), source)
            }
            other => format!("Error during processing: {}", other),
        }
    }

    /// Validation errors are raised before any model work happens
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange { .. }
                | Self::OutOfBounds { .. }
                | Self::OverlappingSections { .. }
                | Self::IndexOutOfRange { .. }
                | Self::NoSections
        )
    }

    pub(crate) fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
