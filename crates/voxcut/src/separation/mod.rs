//! Vocal separation backend
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          SeparationAdapter (voxcut-core trait)          │
//! │  • load() / release() - model lifecycle                 │
//! │  • separate() - clip in, instrumental clip out          │
//! └─────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      OrtBackend                         │
//! │  • ModelManager: download + cache htdemucs.onnx         │
//! │  • rubato: clip rate <-> 44.1 kHz                       │
//! │  • segmented inference with overlap-add                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod backend;
mod config;
mod error;
mod model;
mod resample;
mod segment;

pub use backend::{from_stereo, instrumental_for_clip, to_stereo, OrtBackend};
pub use config::{ModelType, SeparationConfig};
pub use error::SeparationError;
pub use model::{log_progress, DownloadProgress, ModelManager};
pub use resample::resample_interleaved;
pub use segment::{separate_segmented, triangular_weights, SegmentPlan};
