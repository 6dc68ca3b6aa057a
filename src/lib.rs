//! Resumable training and evaluation of image super-resolution models.
//!
//! The neural network core (`math`, `activation`, `layers`, `loss`, `optim`)
//! is written from scratch; `train` and `eval` orchestrate it.

pub mod activation;
pub mod data;
pub mod error;
pub mod eval;
pub mod imaging;
pub mod layers;
pub mod logging;
pub mod loss;
pub mod math;
pub mod metrics;
pub mod model;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{Result, SrError};
pub use eval::{EvalMode, EvaluationDispatcher, EvaluationResult, TestConfig, Tester};
pub use imaging::{ImageBatch, QuantizedImage};
pub use logging::RunLog;
pub use math::Matrix;
pub use model::{BicubicUpscaler, SrModel, Upscaler};
pub use train::{Checkpoint, CheckpointStore, TrainConfig, Trainer, TrainingState};
