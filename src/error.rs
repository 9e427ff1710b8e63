//! Error types for ferrite-tagger.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainError>;

/// Top-level error for configuration, data and training failures.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("Non-finite loss {value} (epoch {epoch:?}, batch {batch:?})")]
    NonFiniteLoss {
        epoch: Option<usize>,
        batch: Option<usize>,
        value: f64,
    },

    #[error("Empty pass: {0}")]
    EmptyPass(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TrainError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Attaches the epoch and batch position to a numeric fault raised by a
    /// single step. Other errors pass through unchanged.
    pub fn at_batch(self, epoch: usize, batch: usize) -> Self {
        match self {
            Self::NonFiniteLoss { value, .. } => Self::NonFiniteLoss {
                epoch: Some(epoch),
                batch: Some(batch),
                value,
            },
            other => other,
        }
    }
}

/// Checkpoint persistence failures. `NotFound` and `Corrupt` are kept apart so a
/// resume can tell a missing slot from a damaged one.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Checkpoint {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Checkpoint IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CheckpointError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
