//! Training configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hyperparameters of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub n_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Learning-rate decay factor applied at each milestone.
    #[serde(default = "default_gamma")]
    pub lr_gamma: f64,
    /// Milestones as fractions of `n_epochs`.
    #[serde(default = "default_milestones")]
    pub milestone_fractions: Vec<f64>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

fn default_seed() -> u64 {
    42
}

fn default_gamma() -> f64 {
    0.1
}

fn default_milestones() -> Vec<f64> {
    vec![0.8, 0.95]
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_epochs: 50,
            batch_size: 8,
            learning_rate: 5e-3,
            seed: default_seed(),
            lr_gamma: default_gamma(),
            milestone_fractions: default_milestones(),
            sample_rate: Some(48000),
        }
    }
}

impl TrainingConfig {
    /// Milestone epochs, `floor(n_epochs * fraction)` for each fraction.
    pub fn milestones(&self) -> Vec<usize> {
        self.milestone_fractions
            .iter()
            .map(|f| (self.n_epochs as f64 * f).floor() as usize)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_epochs == 0 {
            return Err(Error::InvalidConfig("n_epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate {} must be positive",
                self.learning_rate
            )));
        }
        if !(self.lr_gamma > 0.0 && self.lr_gamma <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "lr_gamma {} out of range (0, 1]",
                self.lr_gamma
            )));
        }
        if let Some(f) = self
            .milestone_fractions
            .iter()
            .find(|f| !(0.0..=1.0).contains(*f))
        {
            return Err(Error::InvalidConfig(format!(
                "milestone fraction {} out of range [0, 1]",
                f
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.n_epochs, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_milestones_floor() {
        let config = TrainingConfig {
            n_epochs: 100,
            ..Default::default()
        };
        assert_eq!(config.milestones(), vec![80, 95]);

        let config = TrainingConfig {
            n_epochs: 2,
            ..Default::default()
        };
        assert_eq!(config.milestones(), vec![1, 1]);
    }

    #[test]
    fn test_invalid_values() {
        let bad_lr = TrainingConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(bad_lr.validate().is_err());

        let bad_fraction = TrainingConfig {
            milestone_fractions: vec![1.5],
            ..Default::default()
        };
        assert!(bad_fraction.validate().is_err());
    }

    #[test]
    fn test_toml_defaults() {
        let config: TrainingConfig =
            toml::from_str("n_epochs = 10\nbatch_size = 4\nlearning_rate = 0.001\n").unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.lr_gamma, 0.1);
        assert_eq!(config.milestone_fractions, vec![0.8, 0.95]);
    }
}
