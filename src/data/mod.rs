pub mod batch;
pub mod degradation;
pub mod folder;
pub mod loader;
pub mod prefetch;

pub use batch::{EvalBatch, TrainBatch};
pub use degradation::Degradation;
pub use folder::{scan_images, EvalDatasetConfig, EvalFolderLoader, TrainDatasetConfig, TrainFolderLoader};
pub use loader::{Batches, InMemoryLoader, Loader};
pub use prefetch::prefetch;
