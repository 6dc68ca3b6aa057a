use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::batch::{EvalBatch, TrainBatch};
use crate::data::degradation::Degradation;
use crate::data::loader::{Batches, Loader};
use crate::data::prefetch::prefetch;
use crate::error::{Result, SrError};
use crate::imaging::{ImageBatch, QuantizedImage};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Lists the image files directly inside `dir`, sorted by file name.
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();
    if paths.is_empty() {
        return Err(SrError::dataset(format!("no images found in {}", dir.display())));
    }
    Ok(paths)
}

fn open_image(path: &Path, channels: usize) -> Result<QuantizedImage> {
    let img = image::open(path)?;
    QuantizedImage::from_dynamic(&img, channels)
}

fn crop(img: &QuantizedImage, top: usize, left: usize, height: usize, width: usize) -> QuantizedImage {
    let c = img.channels;
    let mut pixels = Vec::with_capacity(height * width * c);
    for y in top..top + height {
        let start = (y * img.width + left) * c;
        pixels.extend_from_slice(&img.pixels[start..start + width * c]);
    }
    QuantizedImage { height, width, channels: c, pixels }
}

fn flip_horizontal(img: &mut QuantizedImage) {
    let c = img.channels;
    for row in img.pixels.chunks_mut(img.width * c) {
        let mut px: Vec<&[u8]> = row.chunks(c).collect();
        px.reverse();
        let flipped: Vec<u8> = px.concat();
        row.copy_from_slice(&flipped);
    }
}

fn flip_vertical(img: &mut QuantizedImage) {
    let row_len = img.width * img.channels;
    let rows: Vec<Vec<u8>> = img.pixels.chunks(row_len).rev().map(|r| r.to_vec()).collect();
    img.pixels = rows.concat();
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainDatasetConfig {
    pub path: PathBuf,
    pub scales: Vec<usize>,
    /// Low-resolution patch edge; high-resolution crops are `patch_size × scale`.
    pub patch_size: usize,
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default)]
    pub augment: bool,
    #[serde(default)]
    pub degradation: Degradation,
    /// Batches prepared ahead by the worker thread; 0 loads inline.
    #[serde(default = "default_prefetch")]
    pub prefetch: usize,
}

fn default_true() -> bool {
    true
}

fn default_prefetch() -> usize {
    2
}

impl TrainDatasetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scales.is_empty() || self.scales.contains(&0) {
            return Err(SrError::config("train_dataset.scales must be a non-empty list of positive integers"));
        }
        if self.patch_size == 0 || self.batch_size == 0 {
            return Err(SrError::config("train_dataset.patch_size and batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn open(&self, channels: usize, seed: u64) -> Result<TrainFolderLoader> {
        self.validate()?;
        let paths = scan_images(&self.path)?;
        info!(path = %self.path.display(), images = paths.len(), "training dataset opened");
        Ok(TrainFolderLoader {
            paths,
            config: self.clone(),
            channels,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

/// Random patch sampler over a folder of high-resolution images.
///
/// Each pass shuffles the files, draws one scale per batch, crops a random
/// high-resolution patch per file and synthesises its low-resolution input.
pub struct TrainFolderLoader {
    paths: Vec<PathBuf>,
    config: TrainDatasetConfig,
    channels: usize,
    rng: StdRng,
}

impl Loader<TrainBatch> for TrainFolderLoader {
    fn batches(&mut self) -> Result<Batches<'_, TrainBatch>> {
        let mut order = self.paths.clone();
        if self.config.shuffle {
            order.shuffle(&mut self.rng);
        }
        let chunks: Vec<Vec<PathBuf>> = order.chunks(self.config.batch_size).map(|c| c.to_vec()).collect();
        let mut epoch_rng = StdRng::seed_from_u64(self.rng.gen());
        let config = self.config.clone();
        let channels = self.channels;

        let jobs = chunks
            .into_iter()
            .map(move |paths| load_train_batch(&paths, &config, channels, &mut epoch_rng));
        Ok(prefetch(self.config.prefetch, jobs))
    }
}

fn load_train_batch(
    paths: &[PathBuf],
    config: &TrainDatasetConfig,
    channels: usize,
    rng: &mut StdRng,
) -> Result<TrainBatch> {
    let scale = config.scales[rng.gen_range(0..config.scales.len())];
    let hr_size = config.patch_size * scale;
    let mut lrs = Vec::with_capacity(paths.len());
    let mut hrs = Vec::with_capacity(paths.len());

    for path in paths {
        let img = open_image(path, channels)?;
        if img.height < hr_size || img.width < hr_size {
            return Err(SrError::dataset(format!(
                "{} is {}x{}, smaller than the {hr_size}x{hr_size} patch",
                path.display(),
                img.height,
                img.width
            )));
        }
        let top = rng.gen_range(0..=img.height - hr_size);
        let left = rng.gen_range(0..=img.width - hr_size);
        let mut hr = crop(&img, top, left, hr_size, hr_size);
        if config.augment {
            if rng.gen_bool(0.5) {
                flip_horizontal(&mut hr);
            }
            if rng.gen_bool(0.5) {
                flip_vertical(&mut hr);
            }
        }
        lrs.push(config.degradation.apply(&hr, scale)?);
        hrs.push(hr);
    }

    Ok(TrainBatch {
        scale: scale as f64,
        low_res: ImageBatch::from_quantized(&lrs)?,
        high_res: ImageBatch::from_quantized(&hrs)?,
    })
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalDatasetConfig {
    pub path: PathBuf,
    pub scale: usize,
    #[serde(default = "default_eval_batch")]
    pub batch_size: usize,
    #[serde(default)]
    pub degradation: Degradation,
    /// Use only the first `n_images` files (sorted by name).
    #[serde(default)]
    pub n_images: Option<usize>,
}

fn default_eval_batch() -> usize {
    1
}

impl EvalDatasetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 || self.batch_size == 0 {
            return Err(SrError::config("evaluation scale and batch_size must be at least 1"));
        }
        if self.n_images == Some(0) {
            return Err(SrError::config("n_images must be at least 1 when set"));
        }
        Ok(())
    }

    pub fn open(&self, channels: usize) -> Result<EvalFolderLoader> {
        self.validate()?;
        let mut paths = scan_images(&self.path)?;
        if let Some(n) = self.n_images {
            paths.truncate(n);
        }
        info!(path = %self.path.display(), images = paths.len(), "evaluation dataset opened");
        Ok(EvalFolderLoader { paths, config: self.clone(), channels })
    }
}

/// Whole-image evaluation set. High-resolution images are cropped to a
/// multiple of the scale; identifiers are the file names.
pub struct EvalFolderLoader {
    paths: Vec<PathBuf>,
    config: EvalDatasetConfig,
    channels: usize,
}

impl Loader<EvalBatch> for EvalFolderLoader {
    fn batches(&mut self) -> Result<Batches<'_, EvalBatch>> {
        let config = &self.config;
        let channels = self.channels;
        Ok(Box::new(
            self.paths
                .chunks(config.batch_size)
                .map(move |paths| load_eval_batch(paths, config, channels)),
        ))
    }
}

fn load_eval_batch(paths: &[PathBuf], config: &EvalDatasetConfig, channels: usize) -> Result<EvalBatch> {
    let scale = config.scale;
    let mut ids = Vec::with_capacity(paths.len());
    let mut lrs = Vec::with_capacity(paths.len());
    let mut hrs = Vec::with_capacity(paths.len());

    for path in paths {
        let img = open_image(path, channels)?;
        let hr = crop(&img, 0, 0, img.height - img.height % scale, img.width - img.width % scale);
        lrs.push(config.degradation.apply(&hr, scale)?);
        hrs.push(hr);
        ids.push(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
    }

    let high_res = ImageBatch::from_quantized(&hrs)
        .map_err(|err| SrError::dataset(format!("images in one evaluation batch must share a size: {err}")))?;
    Ok(EvalBatch {
        ids,
        scale: scale as f64,
        low_res: ImageBatch::from_quantized(&lrs)?,
        high_res,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(height: usize, width: usize) -> QuantizedImage {
        QuantizedImage {
            height,
            width,
            channels: 1,
            pixels: (0..height * width).map(|v| v as u8).collect(),
        }
    }

    #[test]
    fn crop_takes_the_requested_window() {
        let c = crop(&ramp(4, 4), 1, 2, 2, 2);
        assert_eq!(c.pixels, vec![6, 7, 10, 11]);
    }

    #[test]
    fn flips_reverse_the_right_axis() {
        let mut h = ramp(2, 3);
        flip_horizontal(&mut h);
        assert_eq!(h.pixels, vec![2, 1, 0, 5, 4, 3]);

        let mut v = ramp(2, 3);
        flip_vertical(&mut v);
        assert_eq!(v.pixels, vec![3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn folders_without_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(matches!(scan_images(dir.path()), Err(SrError::Dataset(_))));
    }
}
