pub mod bicubic;
pub mod pixel_net;
pub mod registry;
pub mod upscaler;
pub mod weights;

pub use bicubic::BicubicUpscaler;
pub use pixel_net::PixelNet;
pub use registry::{ModelConfig, ModelKind};
pub use upscaler::{ModelWeights, SrModel, Upscaler};
pub use weights::{load_model_file, load_weights, save_weights};
