use std::path::{Path, PathBuf};

use tracing::debug;

use crate::data::{EvalBatch, Loader};
use crate::error::Result;
use crate::eval::mode::EvalMode;
use crate::imaging::QuantizedImage;
use crate::loss::LossType;
use crate::metrics::{MetricAggregator, QualityMetric};
use crate::model::Upscaler;

/// Extension given to every persisted test output.
pub const OUTPUT_EXTENSION: &str = "png";

/// Where an evaluation pass runs. Only final tests write per-sample outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalContext {
    Validation,
    Test { output_dir: PathBuf },
}

/// Aggregated outcome of one full pass.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub average_psnr: f64,
    pub average_ssim: f64,
    /// Sample-weighted loss, when the dispatcher was given a loss.
    pub average_loss: Option<f64>,
    pub sample_count: usize,
    /// One `[generated | reference]` image per batch, in batch order.
    pub comparisons: Vec<QuantizedImage>,
}

/// Runs evaluation passes through any `Upscaler`.
pub struct EvaluationDispatcher {
    metric: Box<dyn QualityMetric>,
    loss: Option<LossType>,
    context: EvalContext,
}

impl EvaluationDispatcher {
    pub fn new(metric: Box<dyn QualityMetric>) -> Self {
        EvaluationDispatcher { metric, loss: None, context: EvalContext::Validation }
    }

    pub fn with_loss(mut self, loss: LossType) -> Self {
        self.loss = Some(loss);
        self
    }

    pub fn with_context(mut self, context: EvalContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &EvalContext {
        &self.context
    }

    /// Parses `mode` and resolves its backend before touching the loader, so
    /// an unknown mode fails without processing a single batch.
    pub fn evaluate_mode(
        &self,
        loader: &mut dyn Loader<EvalBatch>,
        mode: &str,
        model: Option<&dyn Upscaler>,
    ) -> Result<EvaluationResult> {
        let mode: EvalMode = mode.parse()?;
        let upscaler = mode.resolve(model)?;
        self.evaluate(loader, upscaler)
    }

    pub fn evaluate(&self, loader: &mut dyn Loader<EvalBatch>, upscaler: &dyn Upscaler) -> Result<EvaluationResult> {
        if let EvalContext::Test { output_dir } = &self.context {
            std::fs::create_dir_all(output_dir)?;
        }

        let mut aggregator = MetricAggregator::new();
        let mut comparisons = Vec::new();

        for batch in loader.batches()? {
            let batch = batch?;
            let generated = upscaler.infer(&batch.low_res, batch.scale)?;

            let (psnr, ssim) = self.metric.compute(&batch.high_res, &generated)?;
            aggregator.add_scores(&psnr, &ssim)?;
            if let Some(loss) = self.loss {
                let (value, _) = loss.compute(&generated, &batch.high_res)?;
                aggregator.add_loss(value, batch.len());
            }

            let outputs = generated.to_quantized();
            if let (Some(first), Some(reference)) = (outputs.first(), batch.high_res.to_quantized().into_iter().next()) {
                comparisons.push(first.hconcat(&reference)?);
            }

            if let EvalContext::Test { output_dir } = &self.context {
                for (id, image) in batch.ids.iter().zip(outputs.iter()) {
                    let path = output_path(output_dir, id);
                    image.save(&path)?;
                    debug!(path = %path.display(), "output written");
                }
            }
        }

        let pass = match self.context {
            EvalContext::Validation => "validation",
            EvalContext::Test { .. } => "test",
        };
        let metrics = aggregator.finalize(pass)?;
        Ok(EvaluationResult {
            average_psnr: metrics.psnr,
            average_ssim: metrics.ssim,
            average_loss: metrics.loss,
            sample_count: metrics.samples,
            comparisons,
        })
    }
}

/// `<output_dir>/<id stem>.png`.
pub fn output_path(output_dir: &Path, id: &str) -> PathBuf {
    let stem = Path::new(id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string());
    output_dir.join(format!("{stem}.{OUTPUT_EXTENSION}"))
}
