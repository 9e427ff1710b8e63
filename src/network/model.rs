use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::layers::parameter::Parameter;
use crate::math::matrix::Matrix;

/// Train/eval switch for layers whose behaviour differs between the two
/// (dropout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Serializable snapshot of every parameter value, in `parameters()` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub parameters: Vec<TensorState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorState {
    pub name: String,
    pub value: Matrix,
}

/// What the training core needs from a model.
///
/// `backward` must accumulate into each parameter's `grad` (not overwrite),
/// using the activations cached by the most recent `forward`.
pub trait Model {
    /// Maps an `n × input_size` batch to `n × output_size` label scores.
    fn forward(&mut self, inputs: &Matrix) -> Matrix;

    /// Backpropagates ∂L/∂scores for the last forward batch.
    fn backward(&mut self, grad_output: &Matrix);

    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn set_mode(&mut self, mode: Mode);

    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    fn state(&self) -> ModelState {
        ModelState {
            parameters: self
                .parameters()
                .into_iter()
                .map(|p| TensorState { name: p.name.clone(), value: p.value.clone() })
                .collect(),
        }
    }

    /// Loads parameter values, rejecting any state whose names or shapes do
    /// not match this model.
    fn load_state(&mut self, state: &ModelState) -> Result<()> {
        let mut params = self.parameters_mut();
        if params.len() != state.parameters.len() {
            return Err(TrainError::shape(
                "model state",
                format!("{} parameters", params.len()),
                format!("{} parameters", state.parameters.len()),
            ));
        }
        for (param, saved) in params.iter().zip(&state.parameters) {
            if param.name != saved.name {
                return Err(TrainError::shape("model state", &param.name, &saved.name));
            }
            let v = &saved.value;
            if v.shape() != param.value.shape() || v.data.len() != v.rows * v.cols {
                return Err(TrainError::shape(
                    format!("parameter {}", param.name),
                    &param.value,
                    format!("{} ({} values)", v, v.data.len()),
                ));
            }
        }
        for (param, saved) in params.iter_mut().zip(&state.parameters) {
            param.value = saved.value.clone();
            param.zero_grad();
        }
        Ok(())
    }
}
