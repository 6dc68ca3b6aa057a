use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::data::{EvalBatch, EvalFolderLoader, Loader, TrainBatch, TrainFolderLoader};
use crate::error::{Result, SrError};
use crate::eval::{EvaluationDispatcher, EvaluationResult};
use crate::logging::RunLog;
use crate::loss::LossType;
use crate::metrics::{MetricAggregator, PassMetrics, PsnrSsim, QualityMetric};
use crate::model::{save_weights, SrModel};
use crate::optim::{clip_grad_norm, Optimizer};
use crate::train::checkpoint::{Checkpoint, CheckpointStore};
use crate::train::epoch_stats::EpochStats;
use crate::train::scheduler::StepHalving;
use crate::train::state::TrainingState;
use crate::train::train_config::TrainConfig;

/// Step-counted, resumable training loop.
///
/// `train` runs whole passes over the training loader until
/// `max_training_steps` optimizer steps have been taken in total (across
/// restarts), validating after each pass, checkpointing every
/// `checkpoint_every` steps and writing the final model at the end.
pub struct Trainer {
    config: TrainConfig,
    model: Box<dyn SrModel>,
    optimizer: Box<dyn Optimizer>,
    loss: LossType,
    metric: Box<dyn QualityMetric>,
    validator: EvaluationDispatcher,
    scheduler: StepHalving,
    store: CheckpointStore,
    state: TrainingState,
    log: RunLog,
    seed: u64,
}

impl Trainer {
    /// Resolves the model, loss and optimizer named in `config`. Unknown
    /// identifiers fail here, before any data is touched.
    pub fn new(config: TrainConfig, log: RunLog) -> Result<Trainer> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let model = config.model.build(&mut rng)?;
        let optimizer = config.optimizer.build()?;
        info!(
            model = model.name(),
            parameters = model.parameter_count(),
            optimizer = %optimizer.kind(),
            loss = %config.loss,
            seed,
            "trainer ready"
        );
        let mut trainer = Trainer::from_parts(config, model, optimizer, log)?;
        trainer.seed = seed;
        Ok(trainer)
    }

    /// Builds a trainer around an existing model and optimizer.
    pub fn from_parts(
        config: TrainConfig,
        model: Box<dyn SrModel>,
        optimizer: Box<dyn Optimizer>,
        log: RunLog,
    ) -> Result<Trainer> {
        config.validate()?;
        let loss: LossType = config.loss.parse()?;
        let scheduler = StepHalving::new(config.optimizer.halving_interval, config.optimizer.min_learning_rate);
        let store = CheckpointStore::new(config.checkpoint_dir(), config.checkpoint_file.clone());
        let state = TrainingState::fresh(config.optimizer.initial_learning_rate);
        let seed = config.seed.unwrap_or(0);
        Ok(Trainer {
            config,
            model,
            optimizer,
            loss,
            metric: Box::new(PsnrSsim),
            validator: EvaluationDispatcher::new(Box::new(PsnrSsim)).with_loss(loss),
            scheduler,
            store,
            state,
            log,
            seed,
        })
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn model(&self) -> &dyn SrModel {
        self.model.as_ref()
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Opens the folder datasets named in the configuration.
    pub fn open_loaders(&self) -> Result<(TrainFolderLoader, EvalFolderLoader)> {
        let channels = self.config.model.image_channels;
        let train = self.config.train_dataset.open(channels, self.seed)?;
        let val = self.config.val_dataset.open(channels)?;
        Ok((train, val))
    }

    pub fn train(
        &mut self,
        train_loader: &mut dyn Loader<TrainBatch>,
        val_loader: &mut dyn Loader<EvalBatch>,
    ) -> Result<TrainingState> {
        if self.config.load_checkpoint {
            self.resume()?;
        }

        let max_steps = self.config.max_training_steps;
        if self.state.global_step >= max_steps {
            info!(step = self.state.global_step, max_steps, "step budget already reached");
        } else {
            info!(step = self.state.global_step, epoch = self.state.epoch, max_steps, "training started");
            self.run_epochs(train_loader, val_loader)?;
        }

        self.save_model()?;
        self.log.finish()?;
        Ok(self.state)
    }

    fn run_epochs(
        &mut self,
        train_loader: &mut dyn Loader<TrainBatch>,
        val_loader: &mut dyn Loader<EvalBatch>,
    ) -> Result<()> {
        let max_steps = self.config.max_training_steps;
        loop {
            let started = Instant::now();
            let mut aggregator = MetricAggregator::new();
            let mut budget_reached = false;

            for batch in train_loader.batches()? {
                self.train_step(&batch?, &mut aggregator)?;
                if self.state.global_step % self.config.checkpoint_every == 0 {
                    self.save_checkpoint()?;
                }
                if self.state.global_step >= max_steps {
                    budget_reached = true;
                    break;
                }
            }

            // The partial last epoch is still summarised and validated.
            let train = aggregator.finalize("training")?;
            let validation = self.run_validation(val_loader)?;
            let val = PassMetrics {
                psnr: validation.average_psnr,
                ssim: validation.average_ssim,
                loss: validation.average_loss,
                samples: validation.sample_count,
            };
            self.state.best.update(&train, &val);

            let stats = EpochStats::new(
                self.state.epoch,
                self.state.global_step,
                self.state.learning_rate,
                &train,
                &val,
                self.state.best,
                started.elapsed().as_millis() as u64,
            );
            self.log.epoch(&stats)?;
            self.state.epoch += 1;

            if budget_reached {
                // final checkpoint carries this epoch's bookkeeping
                self.save_checkpoint()?;
                return Ok(());
            }
        }
    }

    fn train_step(&mut self, batch: &TrainBatch, aggregator: &mut MetricAggregator) -> Result<()> {
        let step = self.state.global_step + 1;

        self.model.zero_grad();
        let generated = self.model.forward_train(&batch.low_res, batch.scale)?;
        let (loss, grad) = self.loss.compute(&generated, &batch.high_res)?;
        if !loss.is_finite() {
            return Err(SrError::NonFiniteLoss { step, loss });
        }

        let (psnr, ssim) = self.metric.compute(&batch.high_res, &generated)?;
        aggregator.add_scores(&psnr, &ssim)?;
        aggregator.add_loss(loss, batch.len());

        self.model.backward(&grad)?;
        let mut params = self.model.parameters_mut();
        if let Some(max_norm) = self.config.gradient_clip_norm {
            let norm = clip_grad_norm(&mut params, max_norm);
            if norm > max_norm {
                debug!(step, norm, max_norm, "gradients clipped");
            }
        }
        self.optimizer.step(&mut params)?;

        self.advance(step);
        debug!(step, loss, lr = self.state.learning_rate, scale = batch.scale, "step");
        Ok(())
    }

    /// Moves the step counter and the learning rate together. Nothing that
    /// can fail or be persisted runs between the two updates.
    fn advance(&mut self, step: u64) {
        let rate = self.scheduler.next_rate(step, self.state.learning_rate);
        if rate != self.state.learning_rate {
            info!(step, from = self.state.learning_rate, to = rate, "learning rate halved");
        }
        self.optimizer.set_learning_rate(rate);
        self.state.global_step = step;
        self.state.learning_rate = rate;
    }

    fn resume(&mut self) -> Result<()> {
        let Some(restored) = self.store.restore(self.model.as_mut(), self.optimizer.as_mut())? else {
            return Ok(());
        };

        if self.config.restart_steps_count {
            let rate = self.config.optimizer.initial_learning_rate;
            self.optimizer.set_learning_rate(rate);
            self.state = TrainingState { global_step: 0, learning_rate: rate, ..restored };
            info!(epoch = restored.epoch, lr = rate, "weights restored, step count and learning rate reset");
        } else {
            self.optimizer.set_learning_rate(restored.learning_rate);
            self.state = restored;
            info!(
                step = restored.global_step,
                epoch = restored.epoch,
                lr = restored.learning_rate,
                "training resumed"
            );
        }
        Ok(())
    }

    /// One validation pass over `val_loader` through the current model.
    pub fn validate(&self, val_loader: &mut dyn Loader<EvalBatch>) -> Result<EvaluationResult> {
        self.validator.evaluate(val_loader, self.model.as_upscaler())
    }

    fn run_validation(&self, val_loader: &mut dyn Loader<EvalBatch>) -> Result<EvaluationResult> {
        let result = self.validate(val_loader)?;
        if let Some(dir) = &self.config.comparison_dir {
            std::fs::create_dir_all(dir)?;
            for (i, image) in result.comparisons.iter().enumerate() {
                image.save(&dir.join(format!("epoch_{:04}_{i:03}.png", self.state.epoch)))?;
            }
        }
        Ok(result)
    }

    pub fn save_checkpoint(&self) -> Result<()> {
        let checkpoint = Checkpoint::capture(&self.state, self.model.as_ref(), self.optimizer.as_ref());
        self.store.save(&checkpoint)
    }

    /// Writes the model weights (only) to the configured output file.
    pub fn save_model(&self) -> Result<()> {
        let path = self.config.model_path();
        save_weights(&path, &self.model.state_dict())?;
        info!(path = %path.display(), step = self.state.global_step, "final model saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Degradation, EvalDatasetConfig, InMemoryLoader, TrainDatasetConfig};
    use crate::imaging::ImageBatch;
    use crate::model::ModelConfig;
    use crate::optim::OptimizerConfig;
    use std::path::Path;

    fn config(folder: &Path) -> TrainConfig {
        TrainConfig {
            model: ModelConfig {
                name: "pixel_linear".into(),
                image_channels: 1,
                n_features: 4,
                activation: Default::default(),
            },
            loss: "l1".into(),
            optimizer: OptimizerConfig {
                name: "adam".into(),
                initial_learning_rate: 0.01,
                halving_interval: 2,
                min_learning_rate: 0.001,
                betas: [0.9, 0.999],
                eps: 1e-8,
                momentum: 0.0,
                weight_decay: 0.0,
            },
            max_training_steps: 5,
            checkpoint_every: 100,
            load_checkpoint: false,
            restart_steps_count: false,
            gradient_clip_norm: Some(1.0),
            seed: Some(7),
            model_folder: folder.to_path_buf(),
            checkpoint_file: "ckpt".into(),
            output_model_file: "final".into(),
            log_file: None,
            comparison_dir: None,
            train_dataset: TrainDatasetConfig {
                path: folder.join("train"),
                scales: vec![2],
                patch_size: 2,
                batch_size: 1,
                shuffle: false,
                augment: false,
                degradation: Degradation::Bicubic,
                prefetch: 0,
            },
            val_dataset: EvalDatasetConfig {
                path: folder.join("val"),
                scale: 2,
                batch_size: 1,
                degradation: Degradation::Bicubic,
                n_images: None,
            },
        }
    }

    fn patch(value: f64, size: usize) -> ImageBatch {
        ImageBatch::from_data(1, size, size, 1, vec![value; size * size]).unwrap()
    }

    fn loaders() -> (InMemoryLoader<TrainBatch>, InMemoryLoader<EvalBatch>) {
        let train = TrainBatch { scale: 2.0, low_res: patch(0.4, 2), high_res: patch(0.5, 4) };
        let val = EvalBatch { ids: vec!["a.png".into()], scale: 2.0, low_res: patch(0.4, 2), high_res: patch(0.5, 4) };
        (InMemoryLoader::new(vec![train.clone(), train]), InMemoryLoader::new(vec![val]))
    }

    #[test]
    fn learning_rate_and_step_move_together() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::new(config(dir.path()), RunLog::disabled()).unwrap();
        let (mut train, mut val) = loaders();

        let state = trainer.train(&mut train, &mut val).unwrap();
        assert_eq!(state.global_step, 5);
        // halved at steps 2 and 4
        assert!((state.learning_rate - 0.0025).abs() < 1e-15);
        assert_eq!(trainer.optimizer().learning_rate(), state.learning_rate);
        // two full epochs of 2 steps plus one partial epoch
        assert_eq!(state.epoch, 3);
    }

    #[test]
    fn empty_training_loader_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::new(config(dir.path()), RunLog::disabled()).unwrap();
        let (_, mut val) = loaders();
        let mut empty = InMemoryLoader::<TrainBatch>::new(Vec::new());
        assert!(matches!(trainer.train(&mut empty, &mut val), Err(SrError::EmptyPass("training"))));
    }

    #[test]
    fn non_finite_loss_stops_before_the_optimizer_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::new(config(dir.path()), RunLog::disabled()).unwrap();
        let before = trainer.model().state_dict();
        let bad = TrainBatch { scale: 2.0, low_res: patch(0.4, 2), high_res: patch(f64::NAN, 4) };
        let (_, mut val) = loaders();
        let mut train = InMemoryLoader::new(vec![bad]);

        let err = trainer.train(&mut train, &mut val).unwrap_err();
        assert!(matches!(err, SrError::NonFiniteLoss { step: 1, .. }));
        assert_eq!(trainer.model().state_dict(), before);
        assert_eq!(trainer.state().global_step, 0);
    }

    #[test]
    fn unknown_loss_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.loss = "perceptual".into();
        assert!(matches!(Trainer::new(cfg, RunLog::disabled()), Err(SrError::UnknownLoss(_))));
    }
}
