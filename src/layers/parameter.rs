use crate::math::matrix::Matrix;

/// A trainable tensor together with its accumulated gradient.
///
/// `grad` always has the same shape as `value`. Frozen parameters
/// (`trainable == false`) still receive gradients from `backward`, but
/// optimizers and gradient clipping skip them.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub value: Matrix,
    pub grad: Matrix,
    pub trainable: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Matrix) -> Parameter {
        let grad = Matrix::zeros(value.rows, value.cols);
        Parameter { name: name.into(), value, grad, trainable: true }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}
