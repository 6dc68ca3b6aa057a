use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::{EvalBatch, EvalDatasetConfig, EvalFolderLoader, Loader};
use crate::error::{Result, SrError};
use crate::eval::dispatcher::{EvalContext, EvaluationDispatcher, EvaluationResult};
use crate::eval::mode::EvalMode;
use crate::logging::{RunLog, TestSummary};
use crate::metrics::PsnrSsim;
use crate::model::{load_model_file, ModelConfig, SrModel};

/// Configuration of a final test run, read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// `"model"` or `"bicubic"`; anything else is rejected before any work.
    pub mode: String,
    pub model: ModelConfig,
    pub model_folder: PathBuf,
    pub output_model_file: String,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    pub test_dataset: EvalDatasetConfig,
}

impl TestConfig {
    pub fn load_json(path: &Path) -> Result<TestConfig> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.mode.parse::<EvalMode>()?;
        if self.output_model_file.is_empty() {
            return Err(SrError::config("output_model_file must not be empty"));
        }
        self.test_dataset.validate()
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_folder.join(format!("{}.json", self.output_model_file))
    }
}

/// Final-test runner: one pass over the test set, per-sample outputs on disk.
pub struct Tester {
    config: TestConfig,
    mode: EvalMode,
    model: Option<Box<dyn SrModel>>,
    dispatcher: EvaluationDispatcher,
    log: RunLog,
}

impl Tester {
    /// Parses the mode first. The model is only built, and its trained
    /// weights loaded, in model mode; a missing weights file is reported
    /// and the freshly initialised model is tested.
    pub fn new(config: TestConfig, log: RunLog) -> Result<Tester> {
        config.validate()?;
        let mode: EvalMode = config.mode.parse()?;
        let model = match mode {
            EvalMode::Model => {
                let seed = config.seed.unwrap_or_else(rand::random);
                let mut model = config.model.build(&mut StdRng::seed_from_u64(seed))?;
                load_model_file(model.as_mut(), &config.model_path())?;
                Some(model)
            }
            EvalMode::Bicubic => None,
        };
        let dispatcher = EvaluationDispatcher::new(Box::new(PsnrSsim))
            .with_context(EvalContext::Test { output_dir: config.output_dir.clone() });
        Ok(Tester { config, mode, model, dispatcher, log })
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn open_loader(&self) -> Result<EvalFolderLoader> {
        self.config.test_dataset.open(self.config.model.image_channels)
    }

    pub fn run(&mut self, loader: &mut dyn Loader<EvalBatch>) -> Result<EvaluationResult> {
        let started = Instant::now();
        let model = self.model.as_deref().map(|m| m.as_upscaler());
        let upscaler = self.mode.resolve(model)?;
        info!(mode = %self.mode, backend = upscaler.name(), output_dir = %self.config.output_dir.display(), "testing");

        let result = self.dispatcher.evaluate(loader, upscaler)?;
        let summary = TestSummary {
            mode: self.mode.to_string(),
            backend: upscaler.name().to_string(),
            average_psnr: result.average_psnr,
            average_ssim: result.average_ssim,
            sample_count: result.sample_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        self.log.test(&summary)?;
        self.log.finish()?;
        Ok(result)
    }
}
