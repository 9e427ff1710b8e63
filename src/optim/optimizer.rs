use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::layers::parameter::Parameter;
use crate::math::matrix::Matrix;

/// A set of parameters sharing a learning rate. Every optimizer in this crate
/// tracks a single group covering all parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub learning_rate: f64,
}

/// What the training core needs from an optimizer.
///
/// Parameters are passed in on every call in the model's `parameters_mut()`
/// order; per-parameter buffers are indexed by that position.
pub trait Optimizer {
    /// Applies one update to every trainable parameter from its current `grad`.
    fn step(&mut self, params: &mut [&mut Parameter]);

    fn zero_grad(&mut self, params: &mut [&mut Parameter]) {
        for p in params.iter_mut() {
            p.zero_grad();
        }
    }

    fn param_groups(&self) -> &[ParamGroup];

    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    /// Opaque serialized state, including the param groups.
    fn state(&self) -> Result<serde_json::Value>;

    /// Restores a value produced by `state`, validated against `params`.
    fn load_state(&mut self, state: &serde_json::Value, params: &[&Parameter]) -> Result<()>;
}

/// Checks per-parameter buffers against the parameters they shadow. An empty
/// buffer list is valid: buffers are created on the first `step`.
pub(crate) fn check_buffers(kind: &str, buffers: &[Matrix], params: &[&Parameter]) -> Result<()> {
    if buffers.is_empty() {
        return Ok(());
    }
    if buffers.len() != params.len() {
        return Err(TrainError::shape(
            format!("{kind} buffers"),
            format!("{} buffers", params.len()),
            format!("{} buffers", buffers.len()),
        ));
    }
    for (buf, param) in buffers.iter().zip(params) {
        if buf.shape() != param.value.shape() || buf.data.len() != buf.rows * buf.cols {
            return Err(TrainError::shape(
                format!("{kind} buffer for {}", param.name),
                &param.value,
                buf,
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_groups(groups: &[ParamGroup]) -> Result<()> {
    if groups.len() != 1 {
        return Err(TrainError::shape("param groups", "1 group", format!("{} groups", groups.len())));
    }
    if !(groups[0].learning_rate.is_finite() && groups[0].learning_rate > 0.0) {
        return Err(TrainError::config(format!(
            "saved learning rate {} is not positive",
            groups[0].learning_rate
        )));
    }
    Ok(())
}

/// Zero buffers shaped like `params`.
pub(crate) fn zero_buffers(params: &[&mut Parameter]) -> Vec<Matrix> {
    params.iter().map(|p| Matrix::zeros(p.value.rows, p.value.cols)).collect()
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn step(&mut self, params: &mut [&mut Parameter]) {
        (**self).step(params)
    }

    fn zero_grad(&mut self, params: &mut [&mut Parameter]) {
        (**self).zero_grad(params)
    }

    fn param_groups(&self) -> &[ParamGroup] {
        (**self).param_groups()
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        (**self).param_groups_mut()
    }

    fn state(&self) -> Result<serde_json::Value> {
        (**self).state()
    }

    fn load_state(&mut self, state: &serde_json::Value, params: &[&Parameter]) -> Result<()> {
        (**self).load_state(state, params)
    }
}
