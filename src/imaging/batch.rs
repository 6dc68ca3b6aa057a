use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SrError};

/// A batch of same-sized images stored NHWC as f64, nominally in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBatch {
    pub len: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f64>,
}

impl ImageBatch {
    pub fn zeros(len: usize, height: usize, width: usize, channels: usize) -> ImageBatch {
        ImageBatch {
            len,
            height,
            width,
            channels,
            data: vec![0.0; len * height * width * channels],
        }
    }

    pub fn from_data(
        len: usize,
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f64>,
    ) -> Result<ImageBatch> {
        let expected = len * height * width * channels;
        if data.len() != expected {
            return Err(SrError::shape(
                format!("{expected} values for {len}x{height}x{width}x{channels}"),
                format!("{} values", data.len()),
            ));
        }
        Ok(ImageBatch { len, height, width, channels, data })
    }

    /// Stacks single images (each length `height * width * channels`) into one batch.
    pub fn stack(height: usize, width: usize, channels: usize, samples: Vec<Vec<f64>>) -> Result<ImageBatch> {
        let len = samples.len();
        let data: Vec<f64> = samples.into_iter().flatten().collect();
        ImageBatch::from_data(len, height, width, channels, data)
    }

    pub fn sample_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn sample(&self, n: usize) -> &[f64] {
        let len = self.sample_len();
        &self.data[n * len..(n + 1) * len]
    }

    pub fn sample_mut(&mut self, n: usize) -> &mut [f64] {
        let len = self.sample_len();
        &mut self.data[n * len..(n + 1) * len]
    }

    pub fn index(&self, n: usize, y: usize, x: usize, c: usize) -> usize {
        ((n * self.height + y) * self.width + x) * self.channels + c
    }

    pub fn get(&self, n: usize, y: usize, x: usize, c: usize) -> f64 {
        self.data[self.index(n, y, x, c)]
    }

    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.len, self.height, self.width, self.channels)
    }

    pub fn shape_string(&self) -> String {
        format!("{}x{}x{}x{}", self.len, self.height, self.width, self.channels)
    }

    pub fn ensure_same_shape(&self, other: &ImageBatch) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(SrError::shape(self.shape_string(), other.shape_string()));
        }
        Ok(())
    }

    /// Quantizes every sample to 8 bits.
    pub fn to_quantized(&self) -> Vec<QuantizedImage> {
        (0..self.len)
            .map(|n| QuantizedImage {
                height: self.height,
                width: self.width,
                channels: self.channels,
                pixels: self.sample(n).iter().map(|&v| quantize(v)).collect(),
            })
            .collect()
    }

    /// Rebuilds a float batch from 8-bit images that all share one shape.
    pub fn from_quantized(images: &[QuantizedImage]) -> Result<ImageBatch> {
        let first = images
            .first()
            .ok_or_else(|| SrError::dataset("cannot build a batch from zero images"))?;
        let (height, width, channels) = (first.height, first.width, first.channels);
        let mut data = Vec::with_capacity(images.len() * first.pixels.len());
        for img in images {
            if (img.height, img.width, img.channels) != (height, width, channels) {
                return Err(SrError::shape(
                    format!("{height}x{width}x{channels}"),
                    format!("{}x{}x{}", img.height, img.width, img.channels),
                ));
            }
            data.extend(img.pixels.iter().map(|&p| p as f64 / 255.0));
        }
        ImageBatch::from_data(images.len(), height, width, channels, data)
    }
}

/// `clip(v * 255, 0, 255)` truncated to an integer.
pub fn quantize(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v * 255.0).clamp(0.0, 255.0) as u8
}

/// An 8-bit HWC image, the final form of every generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedImage {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub pixels: Vec<u8>,
}

impl QuantizedImage {
    pub fn from_dynamic(img: &DynamicImage, channels: usize) -> Result<QuantizedImage> {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let pixels = match channels {
            1 => img.to_luma8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            4 => img.to_rgba8().into_raw(),
            other => return Err(SrError::config(format!("unsupported channel count {other}"))),
        };
        Ok(QuantizedImage { height, width, channels, pixels })
    }

    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width as u32, self.height as u32);
        let raw = self.pixels.clone();
        let bad_buffer = || SrError::shape(
            format!("{}x{}x{} pixels", self.height, self.width, self.channels),
            format!("{} bytes", self.pixels.len()),
        );
        let img = match self.channels {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, raw).ok_or_else(bad_buffer)?),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, raw).ok_or_else(bad_buffer)?),
            4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, raw).ok_or_else(bad_buffer)?),
            other => return Err(SrError::config(format!("unsupported channel count {other}"))),
        };
        Ok(img)
    }

    /// Places `right` next to `self`; both must have the same height and channel count.
    pub fn hconcat(&self, right: &QuantizedImage) -> Result<QuantizedImage> {
        if self.height != right.height || self.channels != right.channels {
            return Err(SrError::shape(
                format!("height {} / {} channels", self.height, self.channels),
                format!("height {} / {} channels", right.height, right.channels),
            ));
        }
        let row_l = self.width * self.channels;
        let row_r = right.width * right.channels;
        let mut pixels = Vec::with_capacity(self.pixels.len() + right.pixels.len());
        for y in 0..self.height {
            pixels.extend_from_slice(&self.pixels[y * row_l..(y + 1) * row_l]);
            pixels.extend_from_slice(&right.pixels[y * row_r..(y + 1) * row_r]);
        }
        Ok(QuantizedImage {
            height: self.height,
            width: self.width + right.width,
            channels: self.channels,
            pixels,
        })
    }

    /// Encodes the image; the format follows the path's extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_dynamic()?.save(path)?;
        Ok(())
    }
}
