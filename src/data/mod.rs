pub mod dataset;
pub mod loader;

pub use dataset::{Dataset, Split};
pub use loader::{Batch, BatchSource, DataLoader};
