//! Error types for beam matching.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a beam-matching run. None of them is recoverable inside
/// the crate; callers decide whether to retry.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrong waveband, wrong dimensionality, non-positive scale or beam width,
    /// or an invalid configuration value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Kernel shape mismatch: target is {target_shape:?}, source is {source_shape:?}")]
    ShapeMismatch {
        target_shape: (usize, usize),
        source_shape: (usize, usize),
    },

    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// The resampler or transform backend reported a failure.
    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[cfg(feature = "fits")]
    #[error("FITS error for '{path}': {source}")]
    Fits {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
