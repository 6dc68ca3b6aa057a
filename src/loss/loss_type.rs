use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::{Result, SrError};
use crate::imaging::ImageBatch;
use crate::loss::{ElementLoss, HuberLoss, MaeLoss, MseLoss};

/// Selects which reconstruction loss the training loop minimises.
///
/// - `L1`: mean absolute error
/// - `Mse`: mean squared error
/// - `Huber`: Huber loss with δ = 1
///
/// All use mean reduction over every pixel of every sample in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    L1,
    Mse,
    Huber,
}

impl LossType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossType::L1 => "l1",
            LossType::Mse => "mse",
            LossType::Huber => "huber",
        }
    }

    /// Returns the scalar loss and ∂loss/∂generated.
    pub fn compute(&self, generated: &ImageBatch, target: &ImageBatch) -> Result<(f64, ImageBatch)> {
        generated.ensure_same_shape(target)?;
        if generated.data.is_empty() {
            return Err(SrError::EmptyPass("loss"));
        }
        let (p, y) = (&generated.data[..], &target.data[..]);
        let (loss, grad) = match self {
            LossType::L1 => (MaeLoss::loss(p, y), MaeLoss::derivative(p, y)),
            LossType::Mse => (MseLoss::loss(p, y), MseLoss::derivative(p, y)),
            LossType::Huber => (HuberLoss::loss(p, y), HuberLoss::derivative(p, y)),
        };
        let grad = ImageBatch::from_data(generated.len, generated.height, generated.width, generated.channels, grad)?;
        Ok((loss, grad))
    }
}

impl FromStr for LossType {
    type Err = SrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" | "l1loss" | "mae" => Ok(LossType::L1),
            "mse" | "mseloss" | "l2" => Ok(LossType::Mse),
            "huber" | "huberloss" | "smoothl1loss" => Ok(LossType::Huber),
            _ => Err(SrError::UnknownLoss(s.to_string())),
        }
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (ImageBatch, ImageBatch) {
        let generated = ImageBatch::from_data(1, 1, 2, 1, vec![0.5, 0.0]).unwrap();
        let target = ImageBatch::from_data(1, 1, 2, 1, vec![0.0, 0.0]).unwrap();
        (generated, target)
    }

    #[test]
    fn torch_style_names_resolve() {
        assert_eq!("L1Loss".parse::<LossType>().unwrap(), LossType::L1);
        assert_eq!("MSELoss".parse::<LossType>().unwrap(), LossType::Mse);
        assert!(matches!("CTCLoss".parse::<LossType>(), Err(SrError::UnknownLoss(_))));
    }

    #[test]
    fn mse_gradient_is_scaled_by_element_count() {
        let (g, t) = pair();
        let (loss, grad) = LossType::Mse.compute(&g, &t).unwrap();
        assert!((loss - 0.125).abs() < 1e-12);
        assert_eq!(grad.data, vec![0.5, 0.0]);
    }

    #[test]
    fn l1_loss_and_subgradient() {
        let (g, t) = pair();
        let (loss, grad) = LossType::L1.compute(&g, &t).unwrap();
        assert!((loss - 0.25).abs() < 1e-12);
        assert_eq!(grad.data, vec![0.5, 0.0]);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let (g, _) = pair();
        let t = ImageBatch::zeros(1, 2, 1, 1);
        assert!(LossType::Huber.compute(&g, &t).is_err());
    }
}
