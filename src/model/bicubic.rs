use image::imageops::FilterType;

use crate::error::{Result, SrError};
use crate::imaging::resize::{resample_batch, scaled_dim};
use crate::imaging::ImageBatch;
use crate::model::upscaler::Upscaler;

/// Parameter-free reference upscaler.
///
/// Each image is quantized to 8 bits, resized with the Catmull-Rom (bicubic)
/// kernel and mapped back to [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct BicubicUpscaler;

impl Upscaler for BicubicUpscaler {
    fn name(&self) -> &str {
        "bicubic"
    }

    fn infer(&self, low_res: &ImageBatch, scale: f64) -> Result<ImageBatch> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SrError::config(format!("scale factor must be positive, got {scale}")));
        }
        resample_batch(
            low_res,
            scaled_dim(low_res.height, scale),
            scaled_dim(low_res.width, scale),
            FilterType::CatmullRom,
        )
    }
}
