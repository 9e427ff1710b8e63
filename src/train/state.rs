/// Epoch-boundary bookkeeping owned by the orchestrator for one run.
///
/// `current_epoch` is the index of the last completed epoch. A fresh state
/// has not completed any epoch yet, which `StartFrom::Fresh` expresses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingState {
    pub current_epoch: usize,
    pub epochs_since_improvement: usize,
    pub best_metric: f64,
}

impl TrainingState {
    pub fn fresh() -> TrainingState {
        TrainingState {
            current_epoch: 0,
            epochs_since_improvement: 0,
            best_metric: f64::NEG_INFINITY,
        }
    }

    /// Records the validation metric of a completed `epoch` and returns
    /// whether it strictly improved on the best so far.
    pub fn record_epoch(&mut self, epoch: usize, metric: f64) -> bool {
        let is_best = metric > self.best_metric;
        if is_best {
            self.best_metric = metric;
            self.epochs_since_improvement = 0;
        } else {
            self.epochs_since_improvement += 1;
        }
        self.current_epoch = epoch;
        is_best
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        TrainingState::fresh()
    }
}

/// Where a run begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartFrom {
    /// Epoch 0 with no best metric.
    Fresh,
    /// Continue after the checkpointed epoch, keeping its counters.
    Resume(TrainingState),
}

impl StartFrom {
    pub fn first_epoch(&self) -> usize {
        match self {
            StartFrom::Fresh => 0,
            StartFrom::Resume(state) => state.current_epoch + 1,
        }
    }

    pub fn state(&self) -> TrainingState {
        match self {
            StartFrom::Fresh => TrainingState::fresh(),
            StartFrom::Resume(state) => *state,
        }
    }
    /// Shuffle seed for the data loaders of this run. A resumed run mixes in
    /// its first epoch so it does not replay the shuffle order of epoch 0.
    pub fn shuffle_seed(&self, seed: Option<u64>) -> Option<u64> {
        seed.map(|s| s ^ self.first_epoch() as u64)
    }
}
