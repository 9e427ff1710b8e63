pub mod checkpoint;
pub mod epoch_stats;
pub mod evaluator;
pub mod metric;
pub mod orchestrator;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointStore, Slot};
pub use epoch_stats::EpochStats;
pub use evaluator::{multilabel_accuracy, Evaluator, StepMode, StepOutcome};
pub use metric::MetricAccumulator;
pub use orchestrator::{PassSummary, RunOutcome, RunReport, TrainingOrchestrator};
pub use state::{StartFrom, TrainingState};
