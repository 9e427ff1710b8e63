use crate::data::loader::Batch;
use crate::error::{Result, TrainError};
use crate::loss::Loss;
use crate::math::matrix::Matrix;
use crate::network::model::Model;
use crate::optim::{clip::clip_gradients, optimizer::Optimizer};

/// Whether a step updates parameters.
pub enum StepMode<'a> {
    /// Forward, loss, backward, clip, update, zero gradients.
    Train(&'a mut dyn Optimizer),
    /// Forward and loss only.
    Eval,
}

/// Loss and accuracy of one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub loss: f64,
    /// Percentage of examples whose predicted label set matches exactly.
    pub accuracy: f64,
}

/// Runs single-batch steps against a model with a fixed loss and gradient
/// clip bound.
pub struct Evaluator {
    loss_fn: Box<dyn Loss>,
    clip_bound: f64,
}

impl Evaluator {
    pub fn new(loss_fn: Box<dyn Loss>, clip_bound: f64) -> Evaluator {
        Evaluator { loss_fn, clip_bound }
    }

    pub fn step<M: Model + ?Sized>(
        &self,
        model: &mut M,
        batch: &Batch,
        mode: StepMode<'_>,
    ) -> Result<StepOutcome> {
        check_batch(model, batch)?;

        let scores = model.forward(&batch.inputs);
        if scores.shape() != batch.targets.shape() {
            return Err(TrainError::shape("model output", &batch.targets, &scores));
        }

        let loss = self.loss_fn.loss(&scores, &batch.targets);
        if !loss.is_finite() {
            return Err(TrainError::NonFiniteLoss { epoch: None, batch: None, value: loss });
        }

        if let StepMode::Train(optimizer) = mode {
            let grad = self.loss_fn.gradient(&scores, &batch.targets);
            model.backward(&grad);

            let mut params = model.parameters_mut();
            clip_gradients(&mut params, self.clip_bound);
            optimizer.step(&mut params);
            optimizer.zero_grad(&mut params);
        }

        Ok(StepOutcome { loss, accuracy: multilabel_accuracy(&scores, &batch.targets) })
    }
}

fn check_batch<M: Model + ?Sized>(model: &M, batch: &Batch) -> Result<()> {
    if batch.size() == 0 {
        return Err(TrainError::shape("batch", "at least one example", "0 examples"));
    }
    if batch.inputs.cols != model.input_size() {
        return Err(TrainError::shape(
            "batch inputs",
            format!("{} features", model.input_size()),
            format!("{} features", batch.inputs.cols),
        ));
    }
    if batch.targets.rows != batch.inputs.rows {
        return Err(TrainError::shape(
            "batch targets",
            format!("{} rows", batch.inputs.rows),
            format!("{} rows", batch.targets.rows),
        ));
    }
    Ok(())
}

/// Exact-set accuracy for multi-label predictions, in percent.
///
/// For each example with `k` positive target labels, the `k` highest-scoring
/// labels are selected; the example is correct only when that set equals the
/// target's positive set. Ties in score go to the lower label index.
pub fn multilabel_accuracy(scores: &Matrix, targets: &Matrix) -> f64 {
    if scores.rows == 0 {
        return 0.0;
    }
    let correct = (0..scores.rows)
        .filter(|&r| top_k_matches(scores.row(r), targets.row(r)))
        .count();
    100.0 * correct as f64 / scores.rows as f64
}

fn top_k_matches(scores: &[f64], target: &[f64]) -> bool {
    let mut positives: Vec<usize> = target
        .iter()
        .enumerate()
        .filter(|&(_, &t)| t > 0.5)
        .map(|(i, _)| i)
        .collect();
    let k = positives.len();

    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    // Stable, so equal scores keep the lower index first. NaN ranks above
    // every number instead of breaking the order.
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    let mut predicted = ranked[..k].to_vec();

    predicted.sort_unstable();
    positives.sort_unstable();
    predicted == positives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::BceLoss;
    use crate::network::{model::Mode, network::Network, spec::NetworkSpec};
    use crate::optim::sgd::Sgd;

    fn rows(r: &[Vec<f64>]) -> Matrix {
        Matrix::from_rows(r).unwrap()
    }

    #[test]
    fn top_k_uses_positive_count_of_each_example() {
        let targets = rows(&vec![vec![1.0, 0.0, 1.0, 0.0]; 3]);
        let scores = rows(&vec![vec![0.9, 0.1, 0.8, 0.3]; 3]);
        assert_eq!(multilabel_accuracy(&scores, &targets), 100.0);
    }

    #[test]
    fn partial_overlap_is_wrong() {
        let targets = rows(&[vec![1.0, 0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]]);
        let scores = rows(&[vec![0.9, 0.85, 0.8, 0.3], vec![0.2, 0.7, 0.1, 0.3]]);
        assert_eq!(multilabel_accuracy(&scores, &targets), 50.0);
    }

    #[test]
    fn example_without_positive_labels_matches_empty_selection() {
        let targets = rows(&[vec![0.0, 0.0]]);
        let scores = rows(&[vec![0.9, 0.8]]);
        assert_eq!(multilabel_accuracy(&scores, &targets), 100.0);
    }

    #[test]
    fn nan_scores_do_not_break_ranking() {
        let row: Vec<f64> = (0..40).map(|i| if i % 3 == 0 { f64::NAN } else { i as f64 / 40.0 }).collect();
        let mut target = vec![0.0; 40];
        target[39] = 1.0;
        target[38] = 1.0;
        let accuracy = multilabel_accuracy(&rows(&[row.clone(), row]), &rows(&[target.clone(), target]));
        assert!((0.0..=100.0).contains(&accuracy));
    }

    #[test]
    fn equal_scores_prefer_lower_label() {
        let scores = rows(&[vec![0.5, 0.5, 0.5], vec![0.5, 0.5, 0.5]]);
        let targets = rows(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        assert_eq!(multilabel_accuracy(&scores, &targets), 50.0);
    }

    fn tiny_network() -> Network {
        let mut net = Network::from_spec(&NetworkSpec {
            input_size: 2,
            hidden_layers: vec![3],
            output_size: 2,
            dropout: 0.0,
        });
        net.set_mode(Mode::Train);
        net
    }

    fn batch() -> Batch {
        Batch {
            inputs: rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]),
            targets: rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]),
        }
    }

    #[test]
    fn eval_step_leaves_parameters_and_gradients_alone() {
        let mut net = tiny_network();
        let before = net.state();
        let evaluator = Evaluator::new(Box::new(BceLoss), 5.0);
        let out = evaluator.step(&mut net, &batch(), StepMode::Eval).unwrap();
        assert!(out.loss > 0.0);
        assert_eq!(net.state(), before);
        assert!(net.parameters().iter().all(|p| p.grad.data.iter().all(|&g| g == 0.0)));
    }

    #[test]
    fn train_step_updates_and_zeroes_gradients() {
        let mut net = tiny_network();
        let before = net.state();
        let mut sgd = Sgd::new(0.5);
        let evaluator = Evaluator::new(Box::new(BceLoss), 5.0);
        evaluator.step(&mut net, &batch(), StepMode::Train(&mut sgd)).unwrap();
        assert_ne!(net.state(), before);
        assert!(net.parameters().iter().all(|p| p.grad.data.iter().all(|&g| g == 0.0)));
    }

    #[test]
    fn mismatched_batch_is_rejected_before_any_update() {
        let mut net = tiny_network();
        let before = net.state();
        let mut sgd = Sgd::new(0.5);
        let evaluator = Evaluator::new(Box::new(BceLoss), 5.0);
        let bad = Batch {
            inputs: rows(&[vec![1.0, 0.0]]),
            targets: rows(&[vec![1.0, 0.0, 1.0]]),
        };
        let err = evaluator.step(&mut net, &bad, StepMode::Train(&mut sgd)).unwrap_err();
        assert!(matches!(err, TrainError::ShapeMismatch { .. }));
        assert_eq!(net.state(), before);
    }
}
