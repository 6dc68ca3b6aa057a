use serde::{Deserialize, Serialize};

/// Fixed-interval halving with a floor; the only decay rule supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepHalving {
    pub halving_interval: u64,
    pub min_learning_rate: f64,
}

impl StepHalving {
    pub fn new(halving_interval: u64, min_learning_rate: f64) -> Self {
        StepHalving { halving_interval, min_learning_rate }
    }

    /// Rate to use after `global_step` steps have completed.
    pub fn next_rate(&self, global_step: u64, current: f64) -> f64 {
        if self.halving_interval != 0 && global_step % self.halving_interval == 0 {
            (current / 2.0).max(self.min_learning_rate)
        } else {
            current
        }
    }
}
