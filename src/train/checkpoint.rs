use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::BestMetrics;
use crate::model::{ModelWeights, SrModel};
use crate::optim::{Optimizer, OptimizerState};
use crate::train::state::TrainingState;

/// Everything needed to resume a run, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub learning_rate: f64,
    pub epochs: u64,
    pub steps: u64,
    pub best_train_psnr: f64,
    pub best_train_ssim: f64,
    pub best_val_psnr: f64,
    pub best_val_ssim: f64,
    pub model_weights: ModelWeights,
    pub optimizer_weights: OptimizerState,
}

impl Checkpoint {
    pub fn capture(state: &TrainingState, model: &dyn SrModel, optimizer: &dyn Optimizer) -> Checkpoint {
        Checkpoint {
            learning_rate: state.learning_rate,
            epochs: state.epoch,
            steps: state.global_step,
            best_train_psnr: state.best.train_psnr,
            best_train_ssim: state.best.train_ssim,
            best_val_psnr: state.best.val_psnr,
            best_val_ssim: state.best.val_ssim,
            model_weights: model.state_dict(),
            optimizer_weights: optimizer.state_dict(),
        }
    }

    pub fn state(&self) -> TrainingState {
        TrainingState {
            global_step: self.steps,
            epoch: self.epochs,
            learning_rate: self.learning_rate,
            best: BestMetrics {
                train_psnr: self.best_train_psnr,
                train_ssim: self.best_train_ssim,
                val_psnr: self.best_val_psnr,
                val_ssim: self.best_val_ssim,
            },
        }
    }

    /// Loads model and optimizer state together. If either part is rejected,
    /// both are left exactly as they were.
    pub fn apply(&self, model: &mut dyn SrModel, optimizer: &mut dyn Optimizer) -> Result<TrainingState> {
        let previous = model.state_dict();
        model.load_state_dict(&self.model_weights)?;

        let loaded = {
            let params = model.parameters();
            optimizer.load_state_dict(&self.optimizer_weights, &params)
        };
        if let Err(err) = loaded {
            model.load_state_dict(&previous)?;
            return Err(err);
        }
        Ok(self.state())
    }
}

/// Single-slot checkpoint storage for one run.
///
/// `save` writes to a temporary file in the same directory, renames it over
/// the checkpoint and only then removes every other file, so a readable
/// checkpoint exists at every instant after the first save.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    file_stem: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, file_stem: impl Into<String>) -> Self {
        CheckpointStore { dir: dir.into(), file_stem: file_stem.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.file_stem))
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", self.file_stem))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.tmp_path();
        let path = self.path();

        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, checkpoint)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        #[cfg(unix)]
        File::open(&self.dir)?.sync_all()?;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let other = entry.path();
            if other == path {
                continue;
            }
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&other)?;
            } else {
                fs::remove_file(&other)?;
            }
            debug!(path = %other.display(), "removed stale checkpoint entry");
        }

        info!(path = %path.display(), step = checkpoint.steps, "checkpoint saved");
        Ok(())
    }

    /// Reads the checkpoint. A missing directory or file is not an error:
    /// it is reported and `None` is returned so the run starts fresh.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.dir.is_dir() {
            warn!(dir = %self.dir.display(), "checkpoint directory does not exist, starting fresh");
            return Ok(None);
        }
        let path = self.path();
        if !path.is_file() {
            warn!(path = %path.display(), "checkpoint file does not exist, starting fresh");
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let checkpoint: Checkpoint = serde_json::from_reader(reader)?;
        info!(path = %path.display(), step = checkpoint.steps, epoch = checkpoint.epochs, "checkpoint loaded");
        Ok(Some(checkpoint))
    }

    /// `load` followed by `Checkpoint::apply`.
    pub fn restore(&self, model: &mut dyn SrModel, optimizer: &mut dyn Optimizer) -> Result<Option<TrainingState>> {
        match self.load()? {
            Some(checkpoint) => checkpoint.apply(model, optimizer).map(Some),
            None => Ok(None),
        }
    }
}
