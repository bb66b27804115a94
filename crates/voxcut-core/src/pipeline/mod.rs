//! Reconstruction pipeline and background processing
//!
//! # Architecture
//!
//! ```text
//! EditingSession::snapshot()
//!     │
//!     │ ProcessingRequest
//!     ▼
//! ProcessingService::spawn()   (named worker thread)
//!     │
//!     │ adapter.load()
//!     ▼
//! ReconstructionPipeline::run()
//!   1. validate + overlap check
//!   2. separate every section (sequential, or rayon pool)
//!   3. splice gaps / originals / instrumentals
//!     │
//!     ▼
//! OutputWriter::write()        (audio + manifest)
//!     │
//!     │ ProcessingStatus (mpsc)        RunOutcome (oneshot)
//!     ▼                                 ▼
//! front-end status line          ProcessingHandle::wait()/finished()
//! ```

mod message;
mod reconstruct;
mod service;

pub use message::ProcessingStatus;
pub use reconstruct::{Fragment, FragmentKind, Reconstruction, ReconstructionPipeline};
pub use service::{ProcessingHandle, ProcessingRequest, ProcessingService, RunOutcome};

use serde::{Deserialize, Serialize};

use crate::separation::DEFAULT_LENGTH_TOLERANCE_FRAMES;

/// Upper bound for concurrent adapter calls
pub const MAX_PARALLEL_SECTIONS: usize = 16;

/// Pipeline configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Largest instrumental length mismatch that is padded or truncated
    /// instead of failing the section (frames)
    pub length_tolerance_frames: usize,
    /// Number of sections separated at once (1 = sequential)
    pub max_parallel_sections: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            length_tolerance_frames: DEFAULT_LENGTH_TOLERANCE_FRAMES,
            max_parallel_sections: 1,
        }
    }
}

impl PipelineOptions {
    /// Clamp values to their valid ranges
    pub fn validate(&mut self) {
        self.max_parallel_sections = self.max_parallel_sections.clamp(1, MAX_PARALLEL_SECTIONS);
    }
}
