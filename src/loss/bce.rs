use crate::loss::Loss;
use crate::math::matrix::Matrix;

/// Binary cross-entropy over per-label probabilities, averaged over every
/// element of the batch. Pair with a Sigmoid output layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BceLoss;

const EPS: f64 = 1e-12;

impl Loss for BceLoss {
    /// -mean(y·log(p+ε) + (1-y)·log(1-p+ε))
    fn loss(&self, scores: &Matrix, targets: &Matrix) -> f64 {
        let n = scores.data.len() as f64;
        scores.data.iter().zip(&targets.data)
            .map(|(p, y)| -(y * (p + EPS).ln() + (1.0 - y) * (1.0 - p + EPS).ln()))
            .sum::<f64>() / n
    }

    /// ∂L/∂p = (p - y) / ((p + ε)(1 - p + ε)) / n
    fn gradient(&self, scores: &Matrix, targets: &Matrix) -> Matrix {
        let n = scores.data.len() as f64;
        scores.zip_map(targets, |p, y| (p - y) / ((p + EPS) * (1.0 - p + EPS)) / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_correct_predictions_have_low_loss() {
        let targets = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let good = Matrix::from_rows(&[vec![0.99, 0.01]]).unwrap();
        let bad = Matrix::from_rows(&[vec![0.01, 0.99]]).unwrap();
        assert!(BceLoss.loss(&good, &targets) < 0.02);
        assert!(BceLoss.loss(&bad, &targets) > 4.0);
    }

    #[test]
    fn gradient_points_towards_targets() {
        let targets = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let scores = Matrix::from_rows(&[vec![0.4, 0.6]]).unwrap();
        let grad = BceLoss.gradient(&scores, &targets);
        assert!(grad.data[0] < 0.0);
        assert!(grad.data[1] > 0.0);
    }
}
