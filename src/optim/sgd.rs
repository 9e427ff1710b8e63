use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layers::parameter::Parameter;
use crate::math::matrix::Matrix;
use crate::optim::optimizer::{check_buffers, check_groups, zero_buffers, Optimizer, ParamGroup};

/// Stochastic gradient descent with optional classical momentum.
#[derive(Debug, Clone)]
pub struct Sgd {
    groups: [ParamGroup; 1],
    pub momentum: f64,
    velocity: Vec<Matrix>,
}

#[derive(Serialize, Deserialize)]
struct SgdState {
    param_groups: Vec<ParamGroup>,
    momentum: f64,
    velocity: Vec<Matrix>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd::with_momentum(learning_rate, 0.0)
    }

    pub fn with_momentum(learning_rate: f64, momentum: f64) -> Sgd {
        Sgd { groups: [ParamGroup { learning_rate }], momentum, velocity: Vec::new() }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [&mut Parameter]) {
        let lr = self.groups[0].learning_rate;
        if self.momentum > 0.0 && self.velocity.len() != params.len() {
            self.velocity = zero_buffers(params);
        }
        for (i, param) in params.iter_mut().enumerate() {
            if !param.trainable {
                continue;
            }
            let update = if self.momentum > 0.0 {
                let momentum = self.momentum;
                let v = &mut self.velocity[i];
                *v = v.zip_map(&param.grad, |v, g| momentum * v + g);
                v.clone()
            } else {
                param.grad.clone()
            };
            param.value = param.value.zip_map(&update, |w, u| w - lr * u);
        }
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    fn state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(SgdState {
            param_groups: self.groups.to_vec(),
            momentum: self.momentum,
            velocity: self.velocity.clone(),
        })?)
    }

    fn load_state(&mut self, state: &serde_json::Value, params: &[&Parameter]) -> Result<()> {
        let state: SgdState = serde_json::from_value(state.clone())?;
        check_groups(&state.param_groups)?;
        check_buffers("sgd velocity", &state.velocity, params)?;
        self.groups = [state.param_groups[0]];
        self.momentum = state.momentum;
        self.velocity = state.velocity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(value: f64, grad: f64) -> Parameter {
        let mut p = Parameter::new("w", Matrix::from_rows(&[vec![value]]).unwrap());
        p.grad.data[0] = grad;
        p
    }

    #[test]
    fn plain_step_moves_against_gradient() {
        let mut sgd = Sgd::new(0.1);
        let mut p = param(1.0, 2.0);
        sgd.step(&mut [&mut p]);
        assert!((p.value.data[0] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn frozen_parameters_are_left_alone() {
        let mut sgd = Sgd::with_momentum(0.1, 0.9);
        let mut p = param(1.0, 2.0);
        p.trainable = false;
        sgd.step(&mut [&mut p]);
        assert_eq!(p.value.data[0], 1.0);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut sgd = Sgd::with_momentum(1.0, 0.5);
        let mut p = param(0.0, 1.0);
        sgd.step(&mut [&mut p]);
        sgd.step(&mut [&mut p]);
        // v1 = 1, v2 = 0.5 + 1 = 1.5
        assert!((p.value.data[0] + 2.5).abs() < 1e-12);
    }
}
