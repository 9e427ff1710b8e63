use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    layers::parameter::Parameter,
    math::matrix::Matrix,
    network::model::Mode,
};

/// Fully connected layer operating on a batch (one example per row).
#[derive(Debug)]
pub struct Layer {
    pub size: usize,
    pub weights: Parameter,
    pub biases: Parameter,
    pub activator: ActivationFunction,
    /// Inverted-dropout probability applied to this layer's output in train mode.
    pub dropout: f64,
    // Cached by the last forward pass for backprop.
    input: Matrix,
    pre_neurons: Matrix,
    dropout_mask: Option<Matrix>,
}

impl Layer {
    pub fn new(
        index: usize,
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        dropout: f64,
    ) -> Layer {
        let weights = match activation {
            ActivationFunction::ReLU => Matrix::he(input_size, size),
            _ => Matrix::xavier(input_size, size),
        };

        Layer {
            size,
            weights: Parameter::new(format!("layers.{index}.weight"), weights),
            biases: Parameter::new(format!("layers.{index}.bias"), Matrix::zeros(1, size)),
            activator: activation,
            dropout,
            input: Matrix::default(),
            pre_neurons: Matrix::default(),
            dropout_mask: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.value.rows
    }

    /// Forward pass over a batch; caches what `backward` needs.
    pub fn feed_from(&mut self, input: &Matrix, mode: Mode) -> Matrix {
        let z = (input * &self.weights.value).add_row(&self.biases.value);
        let mut a = z.map(|x| self.activator.function(x));

        self.dropout_mask = if mode == Mode::Train && self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mut rng = rand::thread_rng();
            let mask = Matrix {
                rows: a.rows,
                cols: a.cols,
                data: (0..a.data.len())
                    .map(|_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
                    .collect(),
            };
            a = a.hadamard(&mask);
            Some(mask)
        } else {
            None
        };

        self.input = input.clone();
        self.pre_neurons = z;
        a
    }

    /// Accumulates weight/bias gradients from `grad_output` (∂L/∂a for this
    /// layer's output) and returns ∂L/∂input for the previous layer.
    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        let grad_a = match &self.dropout_mask {
            Some(mask) => grad_output.hadamard(mask),
            None => grad_output.clone(),
        };
        // δ = ∂L/∂a ⊙ σ'(z)
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        let delta = grad_a.hadamard(&act_derivative);

        self.weights.grad.add_assign(&(&self.input.transpose() * &delta));
        self.biases.grad.add_assign(&delta.sum_rows());

        &delta * &self.weights.value.transpose()
    }
}
