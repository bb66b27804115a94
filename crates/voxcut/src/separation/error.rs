//! Separation error types

use thiserror::Error;

/// Errors that can occur while loading or running the separation model
#[derive(Error, Debug)]
pub enum SeparationError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model download failed: {0}")]
    ModelDownloadFailed(String),

    #[error("Model not loaded")]
    NotLoaded,

    #[error("Separation failed: {0}")]
    SeparationFailed(String),

    #[error("Backend initialization failed: {0}")]
    BackendInitFailed(String),

    #[error("Resampling failed: {0}")]
    ResampleFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SeparationError>;
