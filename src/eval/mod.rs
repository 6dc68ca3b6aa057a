pub mod dispatcher;
pub mod mode;
pub mod tester;

pub use dispatcher::{output_path, EvalContext, EvaluationDispatcher, EvaluationResult, OUTPUT_EXTENSION};
pub use mode::EvalMode;
pub use tester::{TestConfig, Tester};
