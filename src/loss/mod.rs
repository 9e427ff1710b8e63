pub mod bce;

pub use bce::BceLoss;

use crate::math::matrix::Matrix;

/// A scalar training objective over a batch of scores and targets of equal shape.
pub trait Loss {
    fn loss(&self, scores: &Matrix, targets: &Matrix) -> f64;

    /// ∂loss/∂scores, same shape as `scores`.
    fn gradient(&self, scores: &Matrix, targets: &Matrix) -> Matrix;
}
