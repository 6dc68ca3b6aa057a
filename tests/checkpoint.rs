use ferrite_sr::model::{load_model_file, save_weights, ModelConfig, SrModel};
use ferrite_sr::optim::{Optimizer, OptimizerConfig};
use ferrite_sr::train::{Checkpoint, CheckpointStore, TrainingState};
use ferrite_sr::metrics::BestMetrics;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn model(seed: u64) -> Box<dyn SrModel> {
    ModelConfig {
        name: "pixel_mlp".into(),
        image_channels: 3,
        n_features: 4,
        activation: Default::default(),
    }
    .build(&mut StdRng::seed_from_u64(seed))
    .unwrap()
}

fn adam() -> Box<dyn Optimizer> {
    OptimizerConfig {
        name: "adamw".into(),
        initial_learning_rate: 1e-3,
        halving_interval: 100,
        min_learning_rate: 1e-5,
        betas: [0.9, 0.999],
        eps: 1e-8,
        momentum: 0.0,
        weight_decay: 0.01,
    }
    .build()
    .unwrap()
}

/// A model and optimizer that have taken one step, so every buffer is populated.
fn trained() -> (Box<dyn SrModel>, Box<dyn Optimizer>) {
    let mut m = model(11);
    let mut opt = adam();
    for (i, p) in m.parameters_mut().into_iter().enumerate() {
        p.grad.iter_mut().for_each(|g| *g = 0.1 * (i as f64 + 1.0));
    }
    opt.step(&mut m.parameters_mut()).unwrap();
    (m, opt)
}

fn state() -> TrainingState {
    TrainingState {
        global_step: 42,
        epoch: 3,
        learning_rate: 1.0 / 3.0,
        best: BestMetrics { train_psnr: 27.31, train_ssim: 0.8123, val_psnr: 26.9, val_ssim: 0.8001 },
    }
}

#[test]
fn save_then_load_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoints"), "sr");
    let (m, opt) = trained();
    let saved = Checkpoint::capture(&state(), m.as_ref(), opt.as_ref());
    store.save(&saved).unwrap();

    let loaded = store.load().unwrap().expect("checkpoint present");
    assert_eq!(loaded, saved);

    let mut fresh_model = model(99);
    let mut fresh_opt = adam();
    let restored = store.restore(fresh_model.as_mut(), fresh_opt.as_mut()).unwrap().unwrap();
    assert_eq!(restored, state());
    assert_eq!(fresh_model.state_dict(), m.state_dict());
    assert_eq!(fresh_opt.state_dict(), opt.state_dict());
}

#[test]
fn exactly_one_file_remains_after_each_save() {
    let dir = tempfile::tempdir().unwrap();
    let ckpt_dir = dir.path().join("checkpoints");
    std::fs::create_dir_all(&ckpt_dir).unwrap();
    std::fs::write(ckpt_dir.join("old_run.json"), "{}").unwrap();

    let store = CheckpointStore::new(&ckpt_dir, "sr");
    let (m, opt) = trained();
    for step in 1..=3 {
        let mut s = state();
        s.global_step = step;
        store.save(&Checkpoint::capture(&s, m.as_ref(), opt.as_ref())).unwrap();

        let entries: Vec<_> = std::fs::read_dir(&ckpt_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
    assert_eq!(store.load().unwrap().unwrap().steps, 3);
    assert!(store.path().ends_with("checkpoints/sr.json"));
}

#[test]
fn missing_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), "never_written");
    let mut m = model(1);
    let mut opt = adam();
    assert!(store.restore(m.as_mut(), opt.as_mut()).unwrap().is_none());
}

#[test]
fn checkpoint_of_another_architecture_is_rejected_whole() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), "sr");
    let (m, opt) = trained();
    store.save(&Checkpoint::capture(&state(), m.as_ref(), opt.as_ref())).unwrap();

    let mut other = ModelConfig {
        name: "pixel_linear".into(),
        image_channels: 3,
        n_features: 4,
        activation: Default::default(),
    }
    .build(&mut StdRng::seed_from_u64(5))
    .unwrap();
    let before = other.state_dict();
    let mut fresh_opt = adam();
    assert!(store.restore(other.as_mut(), fresh_opt.as_mut()).is_err());
    assert_eq!(other.state_dict(), before);
    assert_eq!(fresh_opt.state_dict().step_count, 0);
}

#[test]
fn weights_with_ragged_rows_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ragged.json");
    let mut m = model(2);
    let mut weights = m.state_dict();
    let (_, first) = weights.iter_mut().next().unwrap();
    first.data[0].pop();
    save_weights(&path, &weights).unwrap();

    let before = m.state_dict();
    assert!(load_model_file(m.as_mut(), &path).is_err());
    assert_eq!(m.state_dict(), before);
}
