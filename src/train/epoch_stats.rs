use serde::{Serialize, Deserialize};

/// Summary of one completed epoch.
///
/// When a progress channel is attached to the orchestrator, one `EpochStats`
/// is sent after each epoch's checkpoint has been written. Receivers are
/// observers only; a dropped receiver does not affect training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index, matching the checkpoint's `epoch`.
    pub epoch: usize,
    /// `max_epochs` of the run.
    pub total_epochs: usize,
    pub train_loss: f64,
    /// Exact-set accuracy in percent.
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate used for this epoch's updates.
    pub learning_rate: f64,
    pub is_best: bool,
    pub epochs_since_improvement: usize,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}
