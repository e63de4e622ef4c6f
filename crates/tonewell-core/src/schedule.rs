//! Multi-step learning-rate schedule.

use serde::{Deserialize, Serialize};

/// Decays the learning rate by `gamma` each time a milestone epoch is reached.
///
/// `step()` is called once at the end of every epoch. The rate in effect during
/// epoch `e` is `base_lr * gamma^m` where `m` counts milestones `<= e`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStepLr {
    base_lr: f64,
    gamma: f64,
    milestones: Vec<usize>,
    last_epoch: usize,
}

impl MultiStepLr {
    pub fn new(base_lr: f64, milestones: Vec<usize>, gamma: f64) -> Self {
        let mut milestones = milestones;
        milestones.sort_unstable();
        Self {
            base_lr,
            gamma,
            milestones,
            last_epoch: 0,
        }
    }

    pub fn from_config(config: &crate::TrainingConfig) -> Self {
        Self::new(config.learning_rate, config.milestones(), config.lr_gamma)
    }

    /// Learning rate for the current epoch.
    pub fn lr(&self) -> f64 {
        self.lr_at(self.last_epoch)
    }

    /// Learning rate in effect during `epoch`.
    pub fn lr_at(&self, epoch: usize) -> f64 {
        let passed = self.milestones.iter().filter(|m| **m <= epoch).count();
        self.base_lr * self.gamma.powi(passed as i32)
    }

    /// Advance one epoch and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.last_epoch += 1;
        self.lr()
    }

    pub fn epoch(&self) -> usize {
        self.last_epoch
    }

    pub fn milestones(&self) -> &[usize] {
        &self.milestones
    }

    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }
}
