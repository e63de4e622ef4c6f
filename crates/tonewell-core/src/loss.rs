//! Criterion specifications.
//!
//! A criterion is written as a `+`-separated list of named terms, each with an
//! optional `weight*` prefix: `"mrstft"`, `"mae+mrstft"`, `"0.5*mae+mrstft"`.
//! Resolution into tensors happens in the backend crate; this module only names
//! and weighs the terms.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One analysis resolution of a short-time Fourier transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StftResolution {
    pub fft_size: usize,
    pub hop_size: usize,
    pub win_length: usize,
}

impl StftResolution {
    pub const fn new(fft_size: usize, hop_size: usize, win_length: usize) -> Self {
        Self {
            fft_size,
            hop_size,
            win_length,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 || self.hop_size == 0 || self.win_length == 0 {
            return Err(Error::InvalidConfig(format!(
                "invalid STFT resolution {:?}",
                self
            )));
        }
        if self.win_length > self.fft_size {
            return Err(Error::InvalidConfig(format!(
                "STFT window {} longer than FFT size {}",
                self.win_length, self.fft_size
            )));
        }
        Ok(())
    }
}

/// Single-resolution STFT defaults.
pub const STFT_DEFAULT: StftResolution = StftResolution::new(1024, 256, 1024);

/// Multi-resolution STFT defaults: long, longer, short.
pub const MRSTFT_DEFAULT: [StftResolution; 3] = [
    StftResolution::new(1024, 120, 600),
    StftResolution::new(2048, 240, 1200),
    StftResolution::new(512, 50, 240),
];

/// A named loss term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "term", rename_all = "kebab-case")]
pub enum LossTermKind {
    /// Spectral convergence + log-magnitude distance at one resolution.
    Stft { resolution: StftResolution },
    /// The same, averaged over several resolutions.
    MultiResolutionStft { resolutions: Vec<StftResolution> },
    /// Mean absolute error in the time domain.
    Mae,
    /// Mean squared error in the time domain.
    Mse,
    /// Error-to-signal ratio used as an objective.
    Esr,
}

impl LossTermKind {
    /// Resolve a term name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "stft" => Ok(Self::Stft {
                resolution: STFT_DEFAULT,
            }),
            "mrstft" => Ok(Self::MultiResolutionStft {
                resolutions: MRSTFT_DEFAULT.to_vec(),
            }),
            "mae" | "l1" => Ok(Self::Mae),
            "mse" | "l2" => Ok(Self::Mse),
            "esr" => Ok(Self::Esr),
            other => Err(Error::UnknownLossTerm(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stft { .. } => "stft",
            Self::MultiResolutionStft { .. } => "mrstft",
            Self::Mae => "mae",
            Self::Mse => "mse",
            Self::Esr => "esr",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Stft { resolution } => resolution.validate(),
            Self::MultiResolutionStft { resolutions } => {
                if resolutions.is_empty() {
                    return Err(Error::InvalidConfig(
                        "multi-resolution STFT needs at least one resolution".into(),
                    ));
                }
                resolutions.iter().try_for_each(StftResolution::validate)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub term: LossTermKind,
    pub weight: f32,
}

/// Weighted sum of loss terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSpec {
    pub terms: Vec<WeightedTerm>,
}

impl LossSpec {
    pub fn single(term: LossTermKind) -> Self {
        Self {
            terms: vec![WeightedTerm { term, weight: 1.0 }],
        }
    }

    pub fn with_term(mut self, term: LossTermKind, weight: f32) -> Self {
        self.terms.push(WeightedTerm { term, weight });
        self
    }

    /// Short label used for telemetry tags, e.g. `mae+mrstft`.
    pub fn label(&self) -> String {
        self.to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if self.terms.is_empty() {
            return Err(Error::InvalidConfig("criterion has no terms".into()));
        }
        for t in &self.terms {
            if !t.weight.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "non-finite weight for term {}",
                    t.term.name()
                )));
            }
            t.term.validate()?;
        }
        Ok(())
    }
}

impl Default for LossSpec {
    fn default() -> Self {
        Self::single(LossTermKind::MultiResolutionStft {
            resolutions: MRSTFT_DEFAULT.to_vec(),
        })
    }
}

impl FromStr for LossSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut terms = Vec::new();
        for part in s.split('+') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::UnknownLossTerm(s.to_string()));
            }
            let (weight, name) = match part.split_once('*') {
                Some((w, name)) => {
                    let weight = w.trim().parse::<f32>().map_err(|_| {
                        Error::InvalidConfig(format!("invalid weight '{}' in '{}'", w, s))
                    })?;
                    (weight, name)
                }
                None => (1.0, part),
            };
            terms.push(WeightedTerm {
                term: LossTermKind::from_name(name)?,
                weight,
            });
        }
        let spec = Self { terms };
        spec.validate()?;
        Ok(spec)
    }
}

impl fmt::Display for LossSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            if (t.weight - 1.0).abs() > f32::EPSILON {
                write!(f, "{}*", t.weight)?;
            }
            write!(f, "{}", t.term.name())?;
        }
        Ok(())
    }
}
