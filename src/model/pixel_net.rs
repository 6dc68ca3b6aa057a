use rand::Rng;

use crate::activation::ActivationFunction;
use crate::error::{Result, SrError};
use crate::imaging::resize::{bilinear, scaled_dim};
use crate::imaging::ImageBatch;
use crate::layers::{Layer, Parameter};
use crate::math::Matrix;
use crate::model::upscaler::{SrModel, Upscaler};

/// Bilinear upsampling followed by a per-pixel dense network that predicts a
/// residual correction.
///
/// Every output pixel is fed `[c_0, …, c_{C-1}, 1/scale]`, so the same
/// weights serve any scale factor. The last layer starts at zero, which makes
/// a freshly built model exactly the bilinear upscaler.
pub struct PixelNet {
    name: String,
    channels: usize,
    layers: Vec<Layer>,
    // (len, height, width) of the last training forward pass
    cached_shape: Option<(usize, usize, usize)>,
}

impl PixelNet {
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        channels: usize,
        hidden: &[usize],
        activation: ActivationFunction,
        rng: &mut R,
    ) -> PixelNet {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut input_size = channels + 1;
        for (i, &size) in hidden.iter().enumerate() {
            layers.push(Layer::new(&format!("layers.{i}"), input_size, size, activation, rng));
            input_size = size;
        }
        layers.push(Layer::zeroed(
            &format!("layers.{}", hidden.len()),
            input_size,
            channels,
            ActivationFunction::Identity,
        ));
        PixelNet { name: name.into(), channels, layers, cached_shape: None }
    }

    fn upsample(&self, low_res: &ImageBatch, scale: f64) -> Result<ImageBatch> {
        if low_res.channels != self.channels {
            return Err(SrError::shape(
                format!("{} channels", self.channels),
                format!("{} channels", low_res.channels),
            ));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SrError::config(format!("scale factor must be positive, got {scale}")));
        }
        Ok(bilinear(
            low_res,
            scaled_dim(low_res.height, scale),
            scaled_dim(low_res.width, scale),
        ))
    }

    fn features(&self, upsampled: &ImageBatch, scale: f64) -> Matrix {
        let inv_scale = 1.0 / scale;
        let data = upsampled
            .data
            .chunks(self.channels)
            .map(|px| {
                let mut row = Vec::with_capacity(self.channels + 1);
                row.extend_from_slice(px);
                row.push(inv_scale);
                row
            })
            .collect();
        Matrix::from_data(data)
    }

    fn add_residual(mut upsampled: ImageBatch, residual: &Matrix) -> ImageBatch {
        for (px, row) in upsampled.data.chunks_mut(residual.cols).zip(residual.data.iter()) {
            for (v, r) in px.iter_mut().zip(row.iter()) {
                *v += r;
            }
        }
        upsampled
    }
}

impl Upscaler for PixelNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, low_res: &ImageBatch, scale: f64) -> Result<ImageBatch> {
        let upsampled = self.upsample(low_res, scale)?;
        let mut current = self.features(&upsampled, scale);
        for layer in &self.layers {
            current = layer.feed(&current);
        }
        Ok(Self::add_residual(upsampled, &current))
    }
}

impl SrModel for PixelNet {
    fn forward_train(&mut self, low_res: &ImageBatch, scale: f64) -> Result<ImageBatch> {
        let upsampled = self.upsample(low_res, scale)?;
        let mut current = self.features(&upsampled, scale);
        for layer in &mut self.layers {
            current = layer.feed_from(current);
        }
        self.cached_shape = Some((upsampled.len, upsampled.height, upsampled.width));
        Ok(Self::add_residual(upsampled, &current))
    }

    fn backward(&mut self, grad_output: &ImageBatch) -> Result<()> {
        let (len, height, width) = self
            .cached_shape
            .take()
            .ok_or_else(|| SrError::config("backward called without a training forward pass"))?;
        let expected = (len, height, width, self.channels);
        if grad_output.shape() != expected {
            return Err(SrError::shape(
                format!("{len}x{height}x{width}x{}", self.channels),
                grad_output.shape_string(),
            ));
        }
        // The residual branch receives the output gradient unchanged.
        let mut delta = Matrix::from_flat(len * height * width, self.channels, &grad_output.data);
        for layer in self.layers.iter_mut().rev() {
            delta = layer
                .backward(&delta)
                .ok_or_else(|| SrError::config("layer cache missing during backward"))?;
        }
        Ok(())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect()
    }

    fn as_upscaler(&self) -> &dyn Upscaler {
        self
    }
}
