use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layers::parameter::Parameter;
use crate::math::matrix::Matrix;
use crate::optim::optimizer::{check_buffers, check_groups, zero_buffers, Optimizer, ParamGroup};

/// Adam with bias-corrected first and second moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    groups: [ParamGroup; 1],
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    steps: u64,
    first_moments: Vec<Matrix>,
    second_moments: Vec<Matrix>,
}

#[derive(Serialize, Deserialize)]
struct AdamState {
    param_groups: Vec<ParamGroup>,
    beta1: f64,
    beta2: f64,
    eps: f64,
    steps: u64,
    first_moments: Vec<Matrix>,
    second_moments: Vec<Matrix>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            groups: [ParamGroup { learning_rate }],
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            steps: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Parameter]) {
        if self.first_moments.len() != params.len() {
            self.first_moments = zero_buffers(params);
            self.second_moments = zero_buffers(params);
        }
        self.steps += 1;

        let lr = self.groups[0].learning_rate;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);
        let t = self.steps.min(i32::MAX as u64) as i32;
        let bias1 = 1.0 - b1.powi(t);
        let bias2 = 1.0 - b2.powi(t);

        for (i, param) in params.iter_mut().enumerate() {
            if !param.trainable {
                continue;
            }
            let m = self.first_moments[i].zip_map(&param.grad, |m, g| b1 * m + (1.0 - b1) * g);
            let v = self.second_moments[i].zip_map(&param.grad, |v, g| b2 * v + (1.0 - b2) * g * g);

            for ((w, &m), &v) in param.value.data.iter_mut().zip(&m.data).zip(&v.data) {
                let m_hat = m / bias1;
                let v_hat = v / bias2;
                *w -= lr * m_hat / (v_hat.sqrt() + eps);
            }

            self.first_moments[i] = m;
            self.second_moments[i] = v;
        }
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    fn state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(AdamState {
            param_groups: self.groups.to_vec(),
            beta1: self.beta1,
            beta2: self.beta2,
            eps: self.eps,
            steps: self.steps,
            first_moments: self.first_moments.clone(),
            second_moments: self.second_moments.clone(),
        })?)
    }

    fn load_state(&mut self, state: &serde_json::Value, params: &[&Parameter]) -> Result<()> {
        let state: AdamState = serde_json::from_value(state.clone())?;
        check_groups(&state.param_groups)?;
        check_buffers("adam first moment", &state.first_moments, params)?;
        check_buffers("adam second moment", &state.second_moments, params)?;
        if state.first_moments.len() != state.second_moments.len() {
            return Err(crate::error::TrainError::shape(
                "adam moments",
                state.first_moments.len(),
                state.second_moments.len(),
            ));
        }
        self.groups = [state.param_groups[0]];
        self.beta1 = state.beta1;
        self.beta2 = state.beta2;
        self.eps = state.eps;
        self.steps = state.steps;
        self.first_moments = state.first_moments;
        self.second_moments = state.second_moments;
        Ok(())
    }
}
