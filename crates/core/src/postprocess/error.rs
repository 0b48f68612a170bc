//! Error types for the postprocess module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a post-processor before it could do anything.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFmpeg is present but not usable.
    #[error("FFmpeg check failed: {reason}")]
    FfmpegUnusable { reason: String },

    /// The task's audio format cannot be embedded into.
    #[error("Thumbnail embedding is not supported for {format} output")]
    UnsupportedFormat { format: String },

    /// Output directory could not be read.
    #[error("Failed to read output directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error during post-processing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
