//! Error type shared by every module of the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SrError {
    #[error("unknown model `{0}` (expected one of: pixel_linear, pixel_mlp)")]
    UnknownModel(String),

    #[error("unknown loss `{0}` (expected one of: l1, mse, huber)")]
    UnknownLoss(String),

    #[error("unknown optimizer `{0}` (expected one of: sgd, adam, adamw)")]
    UnknownOptimizer(String),

    #[error("unknown degradation `{0}` (expected one of: bicubic, bilinear, nearest)")]
    UnknownDegradation(String),

    #[error("`{0}` is not a valid testing mode, change it to \"bicubic\" or \"model\"")]
    InvalidTestMode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("{0} pass produced no samples")]
    EmptyPass(&'static str),

    #[error("non-finite loss {loss} at step {step}")]
    NonFiniteLoss { step: u64, loss: f64 },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl SrError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn shape(expected: impl ToString, found: impl ToString) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SrError>;
