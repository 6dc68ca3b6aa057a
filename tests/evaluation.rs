use std::path::Path;

use ferrite_sr::data::{Batches, EvalBatch, EvalDatasetConfig, InMemoryLoader, Loader};
use ferrite_sr::eval::{EvalContext, EvaluationDispatcher};
use ferrite_sr::metrics::PsnrSsim;
use ferrite_sr::model::{BicubicUpscaler, ModelConfig};
use ferrite_sr::{ImageBatch, Result, SrError};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn batch(ids: &[&str], h: usize, w: usize) -> EvalBatch {
    let n = ids.len();
    let low: Vec<f64> = (0..n * h * w * 3).map(|i| (i % 17) as f64 / 16.0).collect();
    let high: Vec<f64> = (0..n * 2 * h * 2 * w * 3).map(|i| (i % 13) as f64 / 12.0).collect();
    EvalBatch {
        ids: ids.iter().map(|s| s.to_string()).collect(),
        scale: 2.0,
        low_res: ImageBatch::from_data(n, h, w, 3, low).unwrap(),
        high_res: ImageBatch::from_data(n, 2 * h, 2 * w, 3, high).unwrap(),
    }
}

/// Counts how many passes were started.
struct CountingLoader {
    inner: InMemoryLoader<EvalBatch>,
    passes: usize,
}

impl Loader<EvalBatch> for CountingLoader {
    fn batches(&mut self) -> Result<Batches<'_, EvalBatch>> {
        self.passes += 1;
        self.inner.batches()
    }
}

fn write_png(path: &Path, w: u32, h: u32) {
    image::RgbImage::from_fn(w, h, |x, y| image::Rgb([(x * 20) as u8, (y * 20) as u8, 128]))
        .save(path)
        .unwrap();
}

#[test]
fn baseline_doubles_each_dimension_with_8_bit_output() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = EvaluationDispatcher::new(Box::new(PsnrSsim))
        .with_context(EvalContext::Test { output_dir: dir.path().join("out") });
    let mut loader = InMemoryLoader::new(vec![batch(&["a.jpg", "b.jpg"], 5, 7), batch(&["c.png"], 5, 7)]);

    let result = dispatcher.evaluate(&mut loader, &BicubicUpscaler).unwrap();
    assert_eq!(result.sample_count, 3);
    assert_eq!(result.comparisons.len(), 2);
    let cmp = &result.comparisons[0];
    assert_eq!((cmp.height, cmp.width), (10, 28));

    let out = image::open(dir.path().join("out/a.png")).unwrap().to_rgb8();
    assert_eq!(out.dimensions(), (14, 10));
    assert!(dir.path().join("out/b.png").is_file());
    assert!(dir.path().join("out/c.png").is_file());
}

#[test]
fn invalid_mode_fails_before_any_batch() {
    let dispatcher = EvaluationDispatcher::new(Box::new(PsnrSsim));
    let mut loader = CountingLoader { inner: InMemoryLoader::new(vec![batch(&["a.png"], 4, 4)]), passes: 0 };

    let err = dispatcher.evaluate_mode(&mut loader, "invalid_mode", None).unwrap_err();
    assert!(matches!(err, SrError::InvalidTestMode(ref m) if m == "invalid_mode"));
    assert_eq!(loader.passes, 0);
}

#[test]
fn fresh_model_and_bicubic_share_one_contract() {
    let model = ModelConfig {
        name: "pixel_mlp".into(),
        image_channels: 3,
        n_features: 4,
        activation: Default::default(),
    }
    .build(&mut StdRng::seed_from_u64(2))
    .unwrap();
    let dispatcher = EvaluationDispatcher::new(Box::new(PsnrSsim)).with_loss("mse".parse().unwrap());
    let mut loader = InMemoryLoader::new(vec![batch(&["a.png"], 4, 6)]);

    let by_model = dispatcher.evaluate_mode(&mut loader, "model", Some(model.as_upscaler())).unwrap();
    let by_bicubic = dispatcher.evaluate_mode(&mut loader, "bicubic", None).unwrap();
    for result in [&by_model, &by_bicubic] {
        assert_eq!(result.sample_count, 1);
        assert!(result.average_loss.is_some());
        assert!(result.average_psnr > 0.0);
        // validation context writes nothing
    }
    assert_eq!(by_model.comparisons[0].width, by_bicubic.comparisons[0].width);
}

#[test]
fn empty_evaluation_pass_is_an_error() {
    let dispatcher = EvaluationDispatcher::new(Box::new(PsnrSsim));
    let mut loader = InMemoryLoader::<EvalBatch>::new(Vec::new());
    assert!(matches!(
        dispatcher.evaluate(&mut loader, &BicubicUpscaler),
        Err(SrError::EmptyPass("validation"))
    ));
}

#[test]
fn folder_loader_mod_crops_and_names_samples() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("b.png"), 9, 7);
    write_png(&dir.path().join("a.png"), 9, 7);
    let config = EvalDatasetConfig {
        path: dir.path().to_path_buf(),
        scale: 2,
        batch_size: 2,
        degradation: Default::default(),
        n_images: None,
    };
    let mut loader = config.open(3).unwrap();
    let batches: Vec<EvalBatch> = loader.batches().unwrap().map(|b| b.unwrap()).collect();
    assert_eq!(batches.len(), 1);
    let b = &batches[0];
    assert_eq!(b.ids, vec!["a.png".to_string(), "b.png".to_string()]);
    assert_eq!(b.high_res.shape(), (2, 6, 8, 3));
    assert_eq!(b.low_res.shape(), (2, 3, 4, 3));
}
