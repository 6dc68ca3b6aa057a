use serde::{Deserialize, Serialize};

use crate::metrics::BestMetrics;

/// Progress counters of one training run.
///
/// `global_step` and `learning_rate` are only ever changed together by the
/// trainer, so any persisted snapshot pairs a step with the rate in force.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub global_step: u64,
    pub epoch: u64,
    pub learning_rate: f64,
    pub best: BestMetrics,
}

impl TrainingState {
    pub fn fresh(learning_rate: f64) -> Self {
        TrainingState {
            global_step: 0,
            epoch: 0,
            learning_rate,
            best: BestMetrics::default(),
        }
    }
}
