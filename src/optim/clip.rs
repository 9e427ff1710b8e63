use crate::layers::parameter::Parameter;

/// Clamps every element of every trainable gradient to `[-bound, bound]`.
pub fn clip_gradients(params: &mut [&mut Parameter], bound: f64) {
    for param in params.iter_mut().filter(|p| p.trainable) {
        param.grad.clamp_in_place(-bound, bound);
    }
}
