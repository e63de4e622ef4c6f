//! Checkpoint selection on validation loss.

/// Running minimum of the validation loss.
///
/// Starts at `+inf`, so the first finite loss always counts as an improvement.
#[derive(Debug, Clone, PartialEq)]
pub struct BestTracker {
    best: f64,
    best_epoch: Option<usize>,
}

impl Default for BestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BestTracker {
    pub fn new() -> Self {
        Self {
            best: f64::INFINITY,
            best_epoch: None,
        }
    }

    /// Resume from a minimum recorded in an earlier run.
    pub fn resume(best: f64, best_epoch: usize) -> Self {
        Self {
            best,
            best_epoch: Some(best_epoch),
        }
    }

    /// Record `loss` for `epoch`; returns `true` when it is strictly below the minimum.
    pub fn observe(&mut self, epoch: usize, loss: f64) -> bool {
        if loss < self.best {
            self.best = loss;
            self.best_epoch = Some(epoch);
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_improvement_only() {
        let mut tracker = BestTracker::new();
        let saves: Vec<bool> = [0.9, 0.5, 0.6, 0.3]
            .iter()
            .enumerate()
            .map(|(epoch, loss)| tracker.observe(epoch, *loss))
            .collect();
        assert_eq!(saves, vec![true, true, false, true]);
        assert_eq!(tracker.best(), 0.3);
        assert_eq!(tracker.best_epoch(), Some(3));
    }

    #[test]
    fn test_equal_loss_is_not_improvement() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(0, 0.5));
        assert!(!tracker.observe(1, 0.5));
    }

    #[test]
    fn test_resume() {
        let mut tracker = BestTracker::resume(0.4, 7);
        assert!(!tracker.observe(8, 0.45));
        assert!(tracker.observe(9, 0.2));
    }

    #[test]
    fn test_nan_never_improves() {
        let mut tracker = BestTracker::new();
        assert!(!tracker.observe(0, f64::NAN));
        assert_eq!(tracker.best_epoch(), None);
    }
}
