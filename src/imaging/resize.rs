use image::imageops::FilterType;

use crate::error::Result;
use crate::imaging::batch::{ImageBatch, QuantizedImage};

/// `round(dim × scale)`, never below one pixel.
pub fn scaled_dim(dim: usize, scale: f64) -> usize {
    ((dim as f64 * scale).round() as usize).max(1)
}

/// Float bilinear resampling with half-pixel centres and edge clamping.
pub fn bilinear(batch: &ImageBatch, out_h: usize, out_w: usize) -> ImageBatch {
    let mut out = ImageBatch::zeros(batch.len, out_h, out_w, batch.channels);
    if batch.height == 0 || batch.width == 0 {
        return out;
    }
    let sy = batch.height as f64 / out_h as f64;
    let sx = batch.width as f64 / out_w as f64;

    for y in 0..out_h {
        let fy = ((y as f64 + 0.5) * sy - 0.5).max(0.0);
        let y0 = (fy.floor() as usize).min(batch.height - 1);
        let y1 = (y0 + 1).min(batch.height - 1);
        let wy = fy - y0 as f64;
        for x in 0..out_w {
            let fx = ((x as f64 + 0.5) * sx - 0.5).max(0.0);
            let x0 = (fx.floor() as usize).min(batch.width - 1);
            let x1 = (x0 + 1).min(batch.width - 1);
            let wx = fx - x0 as f64;
            for n in 0..batch.len {
                for c in 0..batch.channels {
                    let top = batch.get(n, y0, x0, c) * (1.0 - wx) + batch.get(n, y0, x1, c) * wx;
                    let bottom = batch.get(n, y1, x0, c) * (1.0 - wx) + batch.get(n, y1, x1, c) * wx;
                    let idx = out.index(n, y, x, c);
                    out.data[idx] = top * (1.0 - wy) + bottom * wy;
                }
            }
        }
    }
    out
}

/// Resamples one 8-bit image with an `image` crate filter.
pub fn resample_quantized(
    img: &QuantizedImage,
    out_h: usize,
    out_w: usize,
    filter: FilterType,
) -> Result<QuantizedImage> {
    let resized = img.to_dynamic()?.resize_exact(out_w as u32, out_h as u32, filter);
    QuantizedImage::from_dynamic(&resized, img.channels)
}

/// Quantizes every sample, resamples it to `out_h × out_w` and maps it back to [0, 1].
pub fn resample_batch(batch: &ImageBatch, out_h: usize, out_w: usize, filter: FilterType) -> Result<ImageBatch> {
    let resized = batch
        .to_quantized()
        .iter()
        .map(|img| resample_quantized(img, out_h, out_w, filter))
        .collect::<Result<Vec<_>>>()?;
    ImageBatch::from_quantized(&resized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_dim_rounds_and_floors_at_one() {
        assert_eq!(scaled_dim(5, 2.0), 10);
        assert_eq!(scaled_dim(3, 1.5), 5);
        assert_eq!(scaled_dim(1, 0.2), 1);
    }

    #[test]
    fn bilinear_preserves_constant_images() {
        let batch = ImageBatch::from_data(1, 2, 2, 1, vec![0.25; 4]).unwrap();
        let up = bilinear(&batch, 4, 4);
        assert_eq!(up.shape(), (1, 4, 4, 1));
        assert!(up.data.iter().all(|&v| (v - 0.25).abs() < 1e-12));
    }

    #[test]
    fn bicubic_batch_resample_has_target_size() {
        let batch = ImageBatch::from_data(2, 3, 4, 3, vec![0.5; 2 * 3 * 4 * 3]).unwrap();
        let up = resample_batch(&batch, 6, 8, FilterType::CatmullRom).unwrap();
        assert_eq!(up.shape(), (2, 6, 8, 3));
    }
}
