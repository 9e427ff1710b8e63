pub mod model;
pub mod network;
pub mod spec;

pub use model::{Mode, Model, ModelState};
pub use network::Network;
pub use spec::NetworkSpec;
