pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod config;
pub mod error;
pub mod train;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{dense::Layer, parameter::Parameter};
pub use network::{Mode, Model, ModelState, Network, NetworkSpec};
pub use loss::{BceLoss, Loss};
pub use optim::{Adam, LearningRateController, Optimizer, ParamGroup, Sgd};
pub use data::{Batch, BatchSource, DataLoader, Dataset, Split};
pub use config::TrainConfig;
pub use error::{CheckpointError, Result, TrainError};
pub use train::{
    Checkpoint, CheckpointStore, EpochStats, Evaluator, MetricAccumulator, RunOutcome,
    RunReport, Slot, StartFrom, StepMode, TrainingOrchestrator, TrainingState,
};
