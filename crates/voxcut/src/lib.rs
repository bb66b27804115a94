//! voxcut - section-based vocal removal
//!
//! The application side of voxcut:
//!
//! 1. **Decoding**: any format Symphonia reads becomes a [`voxcut_core::Track`].
//!
//! 2. **Separation**: an ONNX Runtime Demucs backend implementing
//!    [`voxcut_core::separation::SeparationAdapter`], with model download and
//!    caching.
//!
//! 3. **Front-end**: configuration loading and command-line parsing for the
//!    `voxcut` binary.

pub mod cli;
pub mod config;
pub mod decode;
pub mod separation;
