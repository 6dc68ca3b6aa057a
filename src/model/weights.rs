use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::upscaler::{ModelWeights, SrModel};

/// Serializes model weights to a pretty-printed JSON file, creating parent directories.
pub fn save_weights(path: &Path, weights: &ModelWeights) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, weights)?;
    writer.flush()?;
    Ok(())
}

/// Deserializes weights previously written by `save_weights`.
pub fn load_weights(path: &Path) -> Result<ModelWeights> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Loads a trained model file into `model` if it exists.
///
/// A missing directory or file is reported and leaves the model at its
/// initialised state; `Ok(false)` tells the caller nothing was loaded.
pub fn load_model_file(model: &mut dyn SrModel, path: &Path) -> Result<bool> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            warn!(dir = %dir.display(), "trained models directory does not exist");
            return Ok(false);
        }
        _ => {}
    }
    if !path.is_file() {
        warn!(path = %path.display(), "trained model file does not exist");
        return Ok(false);
    }
    info!(path = %path.display(), "loading model weights");
    let weights = load_weights(path)?;
    model.load_state_dict(&weights)?;
    Ok(true)
}
