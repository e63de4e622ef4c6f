//! Centralized error type for the tonewell umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tonewell_core::Error),

    #[cfg(feature = "burn")]
    #[error(transparent)]
    Burn(#[from] tonewell_burn::Error),

    #[cfg(feature = "burn")]
    #[error("Checkpoint: {0}")]
    Checkpoint(#[from] tonewell_burn::CheckpointError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Bad input or configuration, as opposed to a failed run.
    pub fn is_config(&self) -> bool {
        match self {
            Error::Core(_) => true,
            #[cfg(feature = "burn")]
            Error::Burn(e) => e.is_config(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
