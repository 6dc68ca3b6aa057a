use serde::{Deserialize, Serialize};

use crate::error::{Result, SrError};

/// Running sums for one pass (a training epoch or an evaluation pass).
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    psnr_sum: f64,
    ssim_sum: f64,
    loss_sum: f64,
    loss_samples: usize,
    samples: usize,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one batch of per-sample scores.
    pub fn add_scores(&mut self, psnr: &[f64], ssim: &[f64]) -> Result<()> {
        if psnr.len() != ssim.len() {
            return Err(SrError::shape(
                format!("{} ssim values", psnr.len()),
                format!("{} ssim values", ssim.len()),
            ));
        }
        self.psnr_sum += psnr.iter().sum::<f64>();
        self.ssim_sum += ssim.iter().sum::<f64>();
        self.samples += psnr.len();
        Ok(())
    }

    /// Adds a batch-mean loss weighted by the batch size.
    pub fn add_loss(&mut self, loss: f64, batch_size: usize) {
        self.loss_sum += loss * batch_size as f64;
        self.loss_samples += batch_size;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Averages the pass. PSNR is rounded to 2 decimals, SSIM to 4.
    pub fn finalize(&self, pass: &'static str) -> Result<PassMetrics> {
        if self.samples == 0 {
            return Err(SrError::EmptyPass(pass));
        }
        let n = self.samples as f64;
        Ok(PassMetrics {
            psnr: round_to(self.psnr_sum / n, 2),
            ssim: round_to(self.ssim_sum / n, 4),
            loss: (self.loss_samples > 0).then(|| self.loss_sum / self.loss_samples as f64),
            samples: self.samples,
        })
    }
}

/// Averages of one finished pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassMetrics {
    pub psnr: f64,
    pub ssim: f64,
    pub loss: Option<f64>,
    pub samples: usize,
}

/// Best-so-far scores over a whole run; they only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BestMetrics {
    pub train_psnr: f64,
    pub train_ssim: f64,
    pub val_psnr: f64,
    pub val_ssim: f64,
}

impl BestMetrics {
    /// Element-wise maximum with one epoch's training and validation averages.
    pub fn update(&mut self, train: &PassMetrics, val: &PassMetrics) {
        self.train_psnr = self.train_psnr.max(train.psnr);
        self.train_ssim = self.train_ssim.max(train.ssim);
        self.val_psnr = self.val_psnr.max(val.psnr);
        self.val_ssim = self.val_ssim.max(val.ssim);
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(psnr: f64, ssim: f64) -> PassMetrics {
        PassMetrics { psnr, ssim, loss: None, samples: 1 }
    }

    #[test]
    fn finalize_rounds_sample_weighted_means() {
        let mut agg = MetricAggregator::new();
        agg.add_scores(&[30.0, 31.0], &[0.9, 0.8]).unwrap();
        agg.add_scores(&[32.333], &[0.77777]).unwrap();
        agg.add_loss(0.5, 2);
        agg.add_loss(0.2, 1);

        let m = agg.finalize("train").unwrap();
        assert_eq!(m.samples, 3);
        assert_eq!(m.psnr, 31.11);
        assert_eq!(m.ssim, 0.8259);
        assert!((m.loss.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_pass_is_an_error() {
        let agg = MetricAggregator::new();
        assert!(matches!(agg.finalize("validation"), Err(SrError::EmptyPass("validation"))));
    }

    #[test]
    fn best_metrics_never_decrease() {
        let mut best = BestMetrics::default();
        best.update(&pass(30.0, 0.9), &pass(28.0, 0.85));
        best.update(&pass(29.0, 0.95), &pass(28.5, 0.80));
        assert_eq!(best, BestMetrics { train_psnr: 30.0, train_ssim: 0.95, val_psnr: 28.5, val_ssim: 0.85 });
    }

    #[test]
    fn mismatched_score_lengths_are_rejected() {
        let mut agg = MetricAggregator::new();
        assert!(agg.add_scores(&[1.0], &[]).is_err());
        assert!(agg.is_empty());
    }
}
