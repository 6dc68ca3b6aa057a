pub mod batch;
pub mod resize;

pub use batch::{quantize, ImageBatch, QuantizedImage};
