pub mod elementwise;
pub mod loss_type;

pub use elementwise::{ElementLoss, HuberLoss, MaeLoss, MseLoss};
pub use loss_type::LossType;
