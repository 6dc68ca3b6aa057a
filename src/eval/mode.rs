use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SrError};
use crate::model::{BicubicUpscaler, Upscaler};

/// Which inference path an evaluation pass drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    /// The trainable model.
    Model,
    /// Parameter-free bicubic resampling.
    Bicubic,
}

impl EvalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalMode::Model => "model",
            EvalMode::Bicubic => "bicubic",
        }
    }

    /// Picks the upscaler for this mode. Model mode needs `model`.
    pub fn resolve<'a>(&self, model: Option<&'a dyn Upscaler>) -> Result<&'a dyn Upscaler> {
        match self {
            EvalMode::Model => {
                model.ok_or_else(|| SrError::config("model mode needs a model to evaluate"))
            }
            EvalMode::Bicubic => Ok(&BicubicUpscaler),
        }
    }
}

impl FromStr for EvalMode {
    type Err = SrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "model" => Ok(EvalMode::Model),
            "bicubic" => Ok(EvalMode::Bicubic),
            _ => Err(SrError::InvalidTestMode(s.to_string())),
        }
    }
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
