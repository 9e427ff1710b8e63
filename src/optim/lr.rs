use tracing::info;

use crate::optim::optimizer::Optimizer;

/// Applies multiplicative learning-rate decay on demand.
pub struct LearningRateController;

impl LearningRateController {
    /// Multiplies every param group's learning rate by `factor` in place.
    /// Leaves all other optimizer state untouched.
    pub fn decay<O: Optimizer + ?Sized>(optimizer: &mut O, factor: f64) {
        for group in optimizer.param_groups_mut() {
            let old = group.learning_rate;
            group.learning_rate *= factor;
            info!(old_lr = old, new_lr = group.learning_rate, "Decaying learning rate");
        }
    }

    /// Current learning rate of the first group.
    pub fn current<O: Optimizer + ?Sized>(optimizer: &O) -> f64 {
        optimizer.param_groups().first().map_or(0.0, |g| g.learning_rate)
    }
}
