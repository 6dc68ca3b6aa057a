pub mod adam;
pub mod clip;
pub mod optimizer;
pub mod sgd;

pub use adam::Adam;
pub use clip::clip_grad_norm;
pub use optimizer::{Optimizer, OptimizerConfig, OptimizerKind, OptimizerState, ParamGroup};
pub use sgd::Sgd;
