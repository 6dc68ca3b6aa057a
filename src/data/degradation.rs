use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SrError};
use crate::imaging::resize::resample_quantized;
use crate::imaging::QuantizedImage;

/// How low-resolution inputs are synthesised from high-resolution images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    #[default]
    Bicubic,
    Bilinear,
    Nearest,
}

impl Degradation {
    pub fn filter(&self) -> FilterType {
        match self {
            Degradation::Bicubic => FilterType::CatmullRom,
            Degradation::Bilinear => FilterType::Triangle,
            Degradation::Nearest => FilterType::Nearest,
        }
    }

    /// Downscales `hr` by an integer factor.
    pub fn apply(&self, hr: &QuantizedImage, scale: usize) -> Result<QuantizedImage> {
        if scale == 0 || hr.height < scale || hr.width < scale {
            return Err(SrError::dataset(format!(
                "cannot downscale a {}x{} image by {scale}",
                hr.height, hr.width
            )));
        }
        resample_quantized(hr, hr.height / scale, hr.width / scale, self.filter())
    }
}

impl FromStr for Degradation {
    type Err = SrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bicubic" => Ok(Degradation::Bicubic),
            "bilinear" => Ok(Degradation::Bilinear),
            "nearest" => Ok(Degradation::Nearest),
            _ => Err(SrError::UnknownDegradation(s.to_string())),
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Degradation::Bicubic => "bicubic",
            Degradation::Bilinear => "bilinear",
            Degradation::Nearest => "nearest",
        })
    }
}
