use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::error::SrError;
use crate::model::pixel_net::PixelNet;
use crate::model::upscaler::SrModel;

/// The closed set of trainable architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Bilinear upsampling plus a single per-pixel linear correction.
    PixelLinear,
    /// Bilinear upsampling plus a one-hidden-layer per-pixel MLP.
    PixelMlp,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::PixelLinear => "pixel_linear",
            ModelKind::PixelMlp => "pixel_mlp",
        }
    }

    pub fn build<R: Rng + ?Sized>(&self, config: &ModelConfig, rng: &mut R) -> Box<dyn SrModel> {
        let hidden: &[usize] = match self {
            ModelKind::PixelLinear => &[],
            ModelKind::PixelMlp => std::slice::from_ref(&config.n_features),
        };
        Box::new(PixelNet::new(self.as_str(), config.image_channels, hidden, config.activation, rng))
    }
}

impl FromStr for ModelKind {
    type Err = SrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pixel_linear" | "pixellinear" => Ok(ModelKind::PixelLinear),
            "pixel_mlp" | "pixelmlp" => Ok(ModelKind::PixelMlp),
            _ => Err(SrError::UnknownModel(s.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Architecture selection, shared by training and testing configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default = "default_channels")]
    pub image_channels: usize,
    #[serde(default = "default_features")]
    pub n_features: usize,
    #[serde(default)]
    pub activation: ActivationFunction,
}

fn default_channels() -> usize {
    3
}

fn default_features() -> usize {
    16
}

impl ModelConfig {
    /// Resolves the architecture name and builds the model.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Box<dyn SrModel>, SrError> {
        let kind: ModelKind = self.name.parse()?;
        if !matches!(self.image_channels, 1 | 3 | 4) {
            return Err(SrError::config(format!(
                "image_channels must be 1, 3 or 4, got {}",
                self.image_channels
            )));
        }
        if kind == ModelKind::PixelMlp && self.n_features == 0 {
            return Err(SrError::config("n_features must be at least 1"));
        }
        Ok(kind.build(self, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!("PixelMLP".parse::<ModelKind>().unwrap(), ModelKind::PixelMlp);
        assert_eq!("pixel_linear".parse::<ModelKind>().unwrap(), ModelKind::PixelLinear);
    }

    #[test]
    fn unknown_model_fails_fast() {
        let config = ModelConfig {
            name: "edsr".into(),
            image_channels: 3,
            n_features: 8,
            activation: ActivationFunction::ReLU,
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(config.build(&mut rng), Err(SrError::UnknownModel(name)) if name == "edsr"));
    }
}
