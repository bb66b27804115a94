//! voxcut core - section-based vocal removal
//!
//! Given a decoded track and a set of user-selected time sections, builds a
//! new track where every section is followed by an instrumental-only render
//! of itself, and writes the result plus a plain-text manifest to disk.
//!
//! The separation model is injected through [`separation::SeparationAdapter`];
//! decoding and the model backend live in the `voxcut` application crate.

pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod section;
pub mod separation;
pub mod session;
pub mod time_format;
pub mod types;

pub use error::{ProcessingError, Result};
pub use types::*;
