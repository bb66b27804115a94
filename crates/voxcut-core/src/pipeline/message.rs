//! Processing status messages
//!
//! Sent from the worker thread to whatever front-end is listening, in the
//! order the run progresses:
//!
//! LoadingModel → Started → SectionStarted → SectionComplete → ... →
//! Exporting → Complete / Cancelled / Failed

use std::path::PathBuf;
use std::time::Duration;

use crate::section::TimeRange;
use crate::time_format::format_time_precise;

/// Progress messages for one processing run
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingStatus {
    /// The separation adapter is being loaded
    LoadingModel {
        /// Backend name
        backend: String,
    },

    /// Sections validated, processing begins
    Started {
        /// Number of sections to process
        total_sections: usize,
        /// Length of the source track in seconds
        track_secs: f64,
    },

    /// A section was handed to the separation adapter
    SectionStarted {
        /// Position in processing order (1-based)
        number: usize,
        /// Number of sections in the run
        total: usize,
        /// The section being processed
        range: TimeRange,
    },

    /// A section's instrumental is ready
    SectionComplete {
        /// Position in processing order (1-based)
        number: usize,
        /// Number of sections in the run
        total: usize,
    },

    /// The combined track is being written
    Exporting {
        /// Length of the combined track in seconds
        output_secs: f64,
    },

    /// Output written
    Complete {
        /// Run directory
        output_dir: PathBuf,
        /// Wall-clock duration of the run
        duration: Duration,
    },

    /// The run was cancelled; nothing was written
    Cancelled,

    /// The run failed; nothing was written
    Failed {
        /// Status text for the error
        message: String,
    },
}

impl ProcessingStatus {
    /// Get a human-readable description of this status
    pub fn description(&self) -> String {
        match self {
            Self::LoadingModel { backend } => {
                format!("Loading separation model ({})...", backend)
            }
            Self::Started { total_sections, .. } => {
                if *total_sections == 1 {
                    "Processing 1 section...".to_string()
                } else {
                    format!("Processing {} sections...", total_sections)
                }
            }
            Self::SectionStarted { number, range, .. } => format!(
                "Section {} processing from {} to {}...",
                number,
                format_time_precise(range.start),
                format_time_precise(range.end)
            ),
            Self::SectionComplete { number, total } => {
                format!("Section {}/{} done", number, total)
            }
            Self::Exporting { .. } => "Exporting final result...".to_string(),
            Self::Complete { output_dir, .. } => format!(
                "Processing complete! Output saved in: {}",
                output_dir.display()
            ),
            Self::Cancelled => "Processing cancelled".to_string(),
            Self::Failed { message } => message.clone(),
        }
    }

    /// Check if this is a terminal message
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Cancelled | Self::Failed { .. }
        )
    }

    /// Whether this message reports an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Get the progress fraction (0.0 to 1.0), if this message carries one
    pub fn progress_fraction(&self) -> Option<f32> {
        match self {
            Self::LoadingModel { .. } | Self::Started { .. } => Some(0.0),
            Self::SectionComplete { number, total } if *total > 0 => {
                // Export takes the last slice of the bar
                Some(0.95 * *number as f32 / *total as f32)
            }
            Self::Exporting { .. } => Some(0.95),
            Self::Complete { .. } => Some(1.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_started_description() {
        let status = ProcessingStatus::SectionStarted {
            number: 2,
            total: 3,
            range: TimeRange::new(50.0, 60.5).unwrap(),
        };
        assert_eq!(status.description(), "Section 2 processing from 00:50.00 to 01:00.50...");
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_terminal_messages() {
        let complete = ProcessingStatus::Complete {
            output_dir: PathBuf::from("output/song_20261016_140327"),
            duration: Duration::from_secs(3),
        };
        assert!(complete.is_terminal());
        assert_eq!(
            complete.description(),
            "Processing complete! Output saved in: output/song_20261016_140327"
        );
        assert!(ProcessingStatus::Cancelled.is_terminal());
        assert!(ProcessingStatus::Failed { message: "x".into() }.is_error());
    }

    #[test]
    fn test_progress_fraction() {
        let half = ProcessingStatus::SectionComplete { number: 1, total: 2 };
        assert!((half.progress_fraction().unwrap() - 0.475).abs() < 1e-6);
        assert_eq!(ProcessingStatus::Cancelled.progress_fraction(), None);
    }
}
