pub mod adam;
pub mod clip;
pub mod lr;
pub mod optimizer;
pub mod sgd;

pub use adam::Adam;
pub use clip::clip_gradients;
pub use lr::LearningRateController;
pub use optimizer::{Optimizer, ParamGroup};
pub use sgd::Sgd;
