use serde::{Deserialize, Serialize};

use crate::metrics::{BestMetrics, PassMetrics};

/// Per-epoch training summary.
///
/// One value is recorded to the run log at the end of every epoch, including
/// a final partial epoch cut short by the step budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: u64,
    /// Optimizer steps completed so far in this run.
    pub global_step: u64,
    pub learning_rate: f64,
    pub train_loss: Option<f64>,
    pub train_psnr: f64,
    pub train_ssim: f64,
    pub val_loss: Option<f64>,
    pub val_psnr: f64,
    pub val_ssim: f64,
    pub best: BestMetrics,
    /// Wall-clock duration of the epoch, validation included.
    pub elapsed_ms: u64,
}

impl EpochStats {
    pub fn new(
        epoch: u64,
        global_step: u64,
        learning_rate: f64,
        train: &PassMetrics,
        val: &PassMetrics,
        best: BestMetrics,
        elapsed_ms: u64,
    ) -> Self {
        EpochStats {
            epoch,
            global_step,
            learning_rate,
            train_loss: train.loss,
            train_psnr: train.psnr,
            train_ssim: train.ssim,
            val_loss: val.loss,
            val_psnr: val.psnr,
            val_ssim: val.ssim,
            best,
            elapsed_ms,
        }
    }
}
