//! Error types for tonewell-core.
//!
//! Everything here is a configuration error: it is raised as soon as a malformed
//! topology, preset, criterion, or tensor shape is detected and is never retried.

use thiserror::Error;

/// Error type for tonewell-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown loss term: {0}")]
    UnknownLossTerm(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Input of {length} samples is shorter than the receptive field ({receptive_field})")]
    SequenceTooShort {
        length: usize,
        receptive_field: usize,
    },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Device mismatch: {0}")]
    DeviceMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
