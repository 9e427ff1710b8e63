use std::sync::mpsc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::train_config::TrainConfig;
use crate::data::loader::BatchSource;
use crate::error::{Result, TrainError};
use crate::loss::Loss;
use crate::network::model::{Mode, Model};
use crate::optim::{lr::LearningRateController, optimizer::Optimizer};
use crate::train::checkpoint::{Checkpoint, CheckpointStore};
use crate::train::epoch_stats::EpochStats;
use crate::train::evaluator::{Evaluator, StepMode};
use crate::train::metric::MetricAccumulator;
use crate::train::state::{StartFrom, TrainingState};

/// How a run ended. Both are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Reached `max_epochs`.
    Completed,
    /// `patience_limit` epochs passed without improvement.
    StoppedEarly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub state: TrainingState,
    /// Epochs trained by this call (not counting epochs before a resume).
    pub epochs_run: usize,
}

/// Mean loss and accuracy of one pass over a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSummary {
    pub loss: f64,
    pub accuracy: f64,
}

/// Owns the model and optimizer for a run and drives the epoch loop:
/// early-stop check, learning-rate decay, train pass, validation pass,
/// improvement decision, checkpoint.
pub struct TrainingOrchestrator<M: Model, O: Optimizer> {
    config: TrainConfig,
    model: M,
    optimizer: O,
    evaluator: Evaluator,
    store: CheckpointStore,
    progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl<M: Model, O: Optimizer> TrainingOrchestrator<M, O> {
    pub fn new(config: TrainConfig, model: M, optimizer: O, loss_fn: Box<dyn Loss>) -> Result<Self> {
        config.validate()?;
        let evaluator = Evaluator::new(loss_fn, config.gradient_clip_bound);
        let store = CheckpointStore::new(&config.checkpoint_dir, &config.dataset_name);
        Ok(Self { config, model, optimizer, evaluator, store, progress_tx: None })
    }

    /// Sends one `EpochStats` per completed epoch to `tx`.
    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn into_parts(self) -> (M, O) {
        (self.model, self.optimizer)
    }

    /// Trains from `start` until `max_epochs` or early stop.
    ///
    /// Any error from a pass or from writing the checkpoint aborts the run;
    /// the epoch in progress leaves no checkpoint behind.
    pub fn run(
        &mut self,
        start: StartFrom,
        train: &mut dyn BatchSource,
        val: &mut dyn BatchSource,
    ) -> Result<RunReport> {
        let mut state = start.state();
        let first_epoch = start.first_epoch();
        let max_epochs = self.config.max_epochs;
        let patience = self.config.patience_limit;
        let decay_period = self.config.stagnation_decay_period;
        let decay_factor = self.config.decay_factor;

        info!(
            dataset = %self.config.dataset_name,
            first_epoch,
            max_epochs,
            patience,
            learning_rate = LearningRateController::current(&self.optimizer),
            train_batches = train.len(),
            val_batches = val.len(),
            "Starting training"
        );

        let mut outcome = RunOutcome::Completed;
        let mut epochs_run = 0;

        for epoch in first_epoch..max_epochs {
            info!("Current epoch {}", epoch + 1);

            if state.epochs_since_improvement >= patience {
                info!(
                    epochs_since_improvement = state.epochs_since_improvement,
                    "No improvement for {} epochs, stopping early",
                    patience
                );
                outcome = RunOutcome::StoppedEarly;
                break;
            }
            if state.epochs_since_improvement > 0 && state.epochs_since_improvement % decay_period == 0 {
                LearningRateController::decay(&mut self.optimizer, decay_factor);
            }
            let learning_rate = LearningRateController::current(&self.optimizer);
            let started = Instant::now();

            let train_summary = self.train_pass(epoch, train)?;
            let val_summary = self.validate_pass(epoch, val)?;

            let is_best = state.record_epoch(epoch, val_summary.accuracy);
            if !is_best {
                info!("Epochs since last improvement: {}", state.epochs_since_improvement);
            }

            info!("Saving checkpoint for epoch {}", epoch + 1);
            let checkpoint = Checkpoint::capture(&state, val_summary.accuracy, is_best, &self.model, &self.optimizer)?;
            self.store.save(&checkpoint)?;
            epochs_run += 1;

            let stats = EpochStats {
                epoch,
                total_epochs: max_epochs,
                train_loss: train_summary.loss,
                train_accuracy: train_summary.accuracy,
                val_loss: val_summary.loss,
                val_accuracy: val_summary.accuracy,
                learning_rate,
                is_best,
                epochs_since_improvement: state.epochs_since_improvement,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            if let Some(tx) = &self.progress_tx {
                if tx.send(stats).is_err() {
                    debug!("Progress receiver dropped");
                }
            }
        }

        info!(
            ?outcome,
            epochs_run,
            best_accuracy = state.best_metric,
            "Training finished"
        );
        Ok(RunReport { outcome, state, epochs_run })
    }

    /// One epoch of parameter updates over every training batch.
    fn train_pass(&mut self, epoch: usize, loader: &mut dyn BatchSource) -> Result<PassSummary> {
        self.model.set_mode(Mode::Train);
        let total = loader.len();
        let print_freq = self.config.print_freq;

        let mut batch_time = MetricAccumulator::new();
        let mut data_time = MetricAccumulator::new();
        let mut losses = MetricAccumulator::new();
        let mut accs = MetricAccumulator::new();

        let mut start = Instant::now();
        for (i, batch) in loader.batches().enumerate() {
            data_time.update(start.elapsed().as_secs_f64());

            let out = self
                .evaluator
                .step(&mut self.model, &batch, StepMode::Train(&mut self.optimizer))
                .map_err(|e| e.at_batch(epoch, i))?;

            losses.update(out.loss);
            accs.update(out.accuracy);
            batch_time.update(start.elapsed().as_secs_f64());
            start = Instant::now();

            if i % print_freq == 0 {
                info!(
                    "Epoch: [{}][{}/{}]\tBatch Time {:.3} ({:.3})\tData Load Time {:.3} ({:.3})\tLoss {:.4} ({:.4})\tAccuracy {:.3} ({:.3})",
                    epoch,
                    i,
                    total,
                    batch_time.last(),
                    batch_time.average().unwrap_or_default(),
                    data_time.last(),
                    data_time.average().unwrap_or_default(),
                    losses.last(),
                    losses.average().unwrap_or_default(),
                    accs.last(),
                    accs.average().unwrap_or_default(),
                );
            }
        }

        summarize(&losses, &accs, loader)
    }

    /// One read-only pass over every validation batch.
    fn validate_pass(&mut self, epoch: usize, loader: &mut dyn BatchSource) -> Result<PassSummary> {
        self.model.set_mode(Mode::Eval);
        let total = loader.len();
        let print_freq = self.config.print_freq;

        let mut batch_time = MetricAccumulator::new();
        let mut losses = MetricAccumulator::new();
        let mut accs = MetricAccumulator::new();

        let mut start = Instant::now();
        for (i, batch) in loader.batches().enumerate() {
            let out = self
                .evaluator
                .step(&mut self.model, &batch, StepMode::Eval)
                .map_err(|e| e.at_batch(epoch, i))?;

            losses.update(out.loss);
            accs.update(out.accuracy);
            batch_time.update(start.elapsed().as_secs_f64());
            start = Instant::now();

            if i % print_freq == 0 {
                info!(
                    "Validation: [{}/{}]\tBatch Time {:.3} ({:.3})\tLoss {:.4} ({:.4})\tAccuracy {:.3} ({:.3})",
                    i,
                    total,
                    batch_time.last(),
                    batch_time.average().unwrap_or_default(),
                    losses.last(),
                    losses.average().unwrap_or_default(),
                    accs.last(),
                    accs.average().unwrap_or_default(),
                );
            }
        }

        let summary = summarize(&losses, &accs, loader)?;
        info!(" * LOSS - {:.3}, ACCURACY - {:.3}", summary.loss, summary.accuracy);
        Ok(summary)
    }
}

fn summarize(
    losses: &MetricAccumulator,
    accs: &MetricAccumulator,
    loader: &dyn BatchSource,
) -> Result<PassSummary> {
    match (losses.average(), accs.average()) {
        (Some(loss), Some(accuracy)) => Ok(PassSummary { loss, accuracy }),
        _ => {
            warn!(split = %loader.split(), "Pass produced no batches");
            Err(TrainError::EmptyPass(format!("{} split yielded no batches", loader.split())))
        }
    }
}
