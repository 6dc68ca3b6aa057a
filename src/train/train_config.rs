use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::{EvalDatasetConfig, TrainDatasetConfig};
use crate::error::{Result, SrError};
use crate::loss::LossType;
use crate::model::{ModelConfig, ModelKind};
use crate::optim::OptimizerConfig;

/// Configuration of one training run, read from a JSON file.
///
/// Artifact locations derive from `model_folder`:
/// - checkpoint: `<model_folder>/checkpoints/<checkpoint_file>.json`
/// - final model: `<model_folder>/<output_model_file>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub model: ModelConfig,
    /// Loss identifier, resolved through `LossType`.
    pub loss: String,
    pub optimizer: OptimizerConfig,
    pub max_training_steps: u64,
    pub checkpoint_every: u64,
    #[serde(default)]
    pub load_checkpoint: bool,
    /// On resume keep the weights but restart the step count and learning rate.
    #[serde(default)]
    pub restart_steps_count: bool,
    #[serde(default)]
    pub gradient_clip_norm: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    pub model_folder: PathBuf,
    pub checkpoint_file: String,
    pub output_model_file: String,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// When set, every validation pass writes its comparison images here.
    #[serde(default)]
    pub comparison_dir: Option<PathBuf>,
    pub train_dataset: TrainDatasetConfig,
    pub val_dataset: EvalDatasetConfig,
}

impl TrainConfig {
    pub fn load_json(path: &Path) -> Result<TrainConfig> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let writer = std::io::BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Resolves every identifier and checks numeric ranges.
    pub fn validate(&self) -> Result<()> {
        self.model.name.parse::<ModelKind>()?;
        self.loss.parse::<LossType>()?;
        self.optimizer.validate()?;
        if self.checkpoint_every == 0 {
            return Err(SrError::config("checkpoint_every must be at least 1"));
        }
        if let Some(norm) = self.gradient_clip_norm {
            if !(norm.is_finite() && norm > 0.0) {
                return Err(SrError::config(format!("gradient_clip_norm must be positive, got {norm}")));
            }
        }
        if self.checkpoint_file.is_empty() || self.output_model_file.is_empty() {
            return Err(SrError::config("checkpoint_file and output_model_file must not be empty"));
        }
        self.train_dataset.validate()?;
        self.val_dataset.validate()
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.model_folder.join("checkpoints")
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_folder.join(format!("{}.json", self.output_model_file))
    }
}
