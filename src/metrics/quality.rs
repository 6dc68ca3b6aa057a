use crate::error::Result;
use crate::imaging::ImageBatch;

/// Upper bound reported for identical images, keeping PSNR finite.
pub const MAX_PSNR: f64 = 100.0;

const SSIM_WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Per-sample fidelity scores for a (reference, generated) batch pair.
pub trait QualityMetric: Send {
    /// Returns `(psnr, ssim)`, one value per sample, in batch order.
    fn compute(&self, reference: &ImageBatch, generated: &ImageBatch) -> Result<(Vec<f64>, Vec<f64>)>;
}

/// PSNR in dB and mean SSIM over a sliding uniform window, both on data in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct PsnrSsim;

impl QualityMetric for PsnrSsim {
    fn compute(&self, reference: &ImageBatch, generated: &ImageBatch) -> Result<(Vec<f64>, Vec<f64>)> {
        reference.ensure_same_shape(generated)?;
        let mut psnr = Vec::with_capacity(reference.len);
        let mut ssim = Vec::with_capacity(reference.len);
        for n in 0..reference.len {
            let clipped: Vec<f64> = generated.sample(n).iter().map(|v| v.clamp(0.0, 1.0)).collect();
            psnr.push(psnr_of(reference.sample(n), &clipped));
            ssim.push(ssim_of(reference.sample(n), &clipped, reference.height, reference.width, reference.channels));
        }
        Ok((psnr, ssim))
    }
}

fn psnr_of(reference: &[f64], generated: &[f64]) -> f64 {
    let mse = reference
        .iter()
        .zip(generated.iter())
        .map(|(r, g)| (r - g).powi(2))
        .sum::<f64>()
        / reference.len().max(1) as f64;
    if mse == 0.0 {
        return MAX_PSNR;
    }
    (10.0 * (1.0 / mse).log10()).min(MAX_PSNR)
}

fn ssim_of(reference: &[f64], generated: &[f64], height: usize, width: usize, channels: usize) -> f64 {
    if height == 0 || width == 0 || channels == 0 {
        return 0.0;
    }
    let mut win = SSIM_WINDOW.min(height).min(width).max(1);
    if win % 2 == 0 {
        win -= 1;
    }
    let c1 = K1 * K1;
    let c2 = K2 * K2;
    let np = (win * win) as f64;
    // sample covariance, as in the usual reference implementation
    let cov_norm = if win > 1 { np / (np - 1.0) } else { 1.0 };

    let at = |buf: &[f64], y: usize, x: usize, c: usize| buf[(y * width + x) * channels + c];

    let mut total = 0.0;
    let mut count = 0usize;
    for c in 0..channels {
        for y0 in 0..=(height - win) {
            for x0 in 0..=(width - win) {
                let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
                for y in y0..y0 + win {
                    for x in x0..x0 + win {
                        let a = at(reference, y, x, c);
                        let b = at(generated, y, x, c);
                        sx += a;
                        sy += b;
                        sxx += a * a;
                        syy += b * b;
                        sxy += a * b;
                    }
                }
                let (ux, uy) = (sx / np, sy / np);
                let vx = cov_norm * (sxx / np - ux * ux);
                let vy = cov_norm * (syy / np - uy * uy);
                let vxy = cov_norm * (sxy / np - ux * uy);
                let s = ((2.0 * ux * uy + c1) * (2.0 * vxy + c2))
                    / ((ux * ux + uy * uy + c1) * (vx + vy + c2));
                total += s;
                count += 1;
            }
        }
    }
    if count == 0 { 0.0 } else { total / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(len: usize) -> ImageBatch {
        let data = (0..len * 8 * 8).map(|i| (i % 64) as f64 / 64.0).collect();
        ImageBatch::from_data(len, 8, 8, 1, data).unwrap()
    }

    #[test]
    fn identical_images_score_max_psnr_and_unit_ssim() {
        let img = gradient(2);
        let (psnr, ssim) = PsnrSsim.compute(&img, &img).unwrap();
        assert_eq!(psnr, vec![MAX_PSNR, MAX_PSNR]);
        assert!(ssim.iter().all(|s| (s - 1.0).abs() < 1e-9));
    }

    #[test]
    fn uniform_error_gives_expected_psnr() {
        let reference = ImageBatch::from_data(1, 4, 4, 1, vec![0.5; 16]).unwrap();
        let generated = ImageBatch::from_data(1, 4, 4, 1, vec![0.6; 16]).unwrap();
        let (psnr, ssim) = PsnrSsim.compute(&reference, &generated).unwrap();
        assert!((psnr[0] - 20.0).abs() < 1e-9);
        assert!(ssim[0] < 1.0);
    }

    #[test]
    fn empty_images_score_zero_ssim() {
        for (height, width) in [(0, 4), (4, 0)] {
            let empty = ImageBatch::from_data(1, height, width, 1, vec![]).unwrap();
            let (psnr, ssim) = PsnrSsim.compute(&empty, &empty).unwrap();
            assert_eq!(psnr, vec![MAX_PSNR]);
            assert_eq!(ssim, vec![0.0]);
        }
    }

    #[test]
    fn tiny_images_use_a_shrunken_window() {
        let reference = ImageBatch::from_data(1, 2, 2, 3, vec![0.2; 12]).unwrap();
        let (_, ssim) = PsnrSsim.compute(&reference, &reference).unwrap();
        assert!((ssim[0] - 1.0).abs() < 1e-9);
    }
}
