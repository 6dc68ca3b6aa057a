pub mod aggregator;
pub mod quality;

pub use aggregator::{round_to, BestMetrics, MetricAggregator, PassMetrics};
pub use quality::{PsnrSsim, QualityMetric, MAX_PSNR};
