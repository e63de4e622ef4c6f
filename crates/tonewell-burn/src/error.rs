//! Error types for the Burn implementation.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Training phase in which a batch was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Validate,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Train => write!(f, "training"),
            Phase::Validate => write!(f, "validation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed shapes, devices, presets, or criteria. Never retried.
    #[error("Configuration error: {0}")]
    Config(#[from] tonewell_core::Error),

    /// Loss or metric stopped being finite; the run cannot continue.
    #[error(
        "Numerical failure in {phase} at epoch {epoch}, batch {batch}: {what} = {value} \
         (last checkpoint: {})",
        display_checkpoint(.last_checkpoint)
    )]
    NumericalFailure {
        phase: Phase,
        epoch: usize,
        batch: usize,
        what: &'static str,
        value: f64,
        last_checkpoint: Option<PathBuf>,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Tensor data error: {0}")]
    TensorData(String),
}

impl Error {
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_numerical(&self) -> bool {
        matches!(self, Error::NumericalFailure { .. })
    }
}

fn display_checkpoint(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Checkpoint persistence failures, split so callers can tell a full disk from
/// an incompatible file.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Invalid checkpoint metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Checkpoint format version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u64, expected: u32 },

    #[error("Checkpoint was written for {found}, cannot load into {expected}")]
    ModelMismatch { found: String, expected: String },

    #[error("Checkpoint describes an invalid model: {0}")]
    InvalidModel(#[from] tonewell_core::Error),

    #[error("No checkpoint found in {0}")]
    NotFound(PathBuf),
}

impl From<burn::record::RecorderError> for CheckpointError {
    fn from(e: burn::record::RecorderError) -> Self {
        CheckpointError::Recorder(e.to_string())
    }
}
