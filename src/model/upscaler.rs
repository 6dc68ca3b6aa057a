use std::collections::BTreeMap;

use crate::error::{Result, SrError};
use crate::imaging::ImageBatch;
use crate::layers::Parameter;
use crate::math::Matrix;

/// Parameter name → value, the serialised form of a model.
pub type ModelWeights = BTreeMap<String, Matrix>;

/// Anything that turns a low-resolution batch into a high-resolution one.
///
/// Both the trainable models and the parameter-free baseline implement this,
/// so evaluation never needs to know which of the two it is driving.
pub trait Upscaler {
    fn name(&self) -> &str;

    /// Output spatial size is `round(dim × scale)` for each dimension.
    fn infer(&self, low_res: &ImageBatch, scale: f64) -> Result<ImageBatch>;
}

/// A trainable super-resolution model.
pub trait SrModel: Upscaler + Send {
    /// Forward pass that records the activations needed by `backward`.
    fn forward_train(&mut self, low_res: &ImageBatch, scale: f64) -> Result<ImageBatch>;

    /// Accumulates parameter gradients given ∂L/∂output of the last `forward_train`.
    fn backward(&mut self, grad_output: &ImageBatch) -> Result<()>;

    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn as_upscaler(&self) -> &dyn Upscaler;

    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    fn state_dict(&self) -> ModelWeights {
        self.parameters()
            .into_iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    /// Replaces every parameter; nothing is modified unless `weights` names
    /// exactly this model's parameters with matching shapes.
    fn load_state_dict(&mut self, weights: &ModelWeights) -> Result<()> {
        let params = self.parameters();
        if params.len() != weights.len() {
            return Err(SrError::checkpoint(format!(
                "model has {} parameters, weights contain {}",
                params.len(),
                weights.len()
            )));
        }
        for p in &params {
            let value = weights
                .get(&p.name)
                .ok_or_else(|| SrError::checkpoint(format!("weights missing parameter {}", p.name)))?;
            if value.shape() != p.value.shape() || value.data.len() != value.rows {
                return Err(SrError::checkpoint(format!(
                    "parameter {} has shape {:?}, weights have {:?}",
                    p.name,
                    p.value.shape(),
                    value.shape()
                )));
            }
            if value.data.iter().any(|row| row.len() != value.cols) {
                return Err(SrError::checkpoint(format!(
                    "parameter {} has rows of unequal length",
                    p.name
                )));
            }
        }
        for p in self.parameters_mut() {
            if let Some(value) = weights.get(&p.name) {
                p.value = value.clone();
            }
        }
        Ok(())
    }
}
