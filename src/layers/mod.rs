pub mod dense;
pub mod parameter;

pub use dense::Layer;
pub use parameter::Parameter;
