pub mod checkpoint;
pub mod epoch_stats;
pub mod scheduler;
pub mod state;
pub mod train_config;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use epoch_stats::EpochStats;
pub use scheduler::StepHalving;
pub use state::TrainingState;
pub use train_config::TrainConfig;
pub use trainer::Trainer;
