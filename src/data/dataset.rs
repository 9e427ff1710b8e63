use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TrainError};

/// Named partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "TRAIN",
            Split::Val => "VAL",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory multi-label examples: one feature vector and one 0/1 label
/// indicator vector per example.
#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<Vec<f64>>,
}

impl Dataset {
    /// Builds and validates a dataset from parallel example vectors.
    pub fn new(inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Result<Dataset> {
        let dataset = Dataset { inputs, targets };
        dataset.validate()?;
        Ok(dataset)
    }

    /// `{data_folder}/{SPLIT}_{dataset_name}.json`
    pub fn path_for(data_folder: &Path, dataset_name: &str, split: Split) -> PathBuf {
        data_folder.join(format!("{}_{}.json", split, dataset_name))
    }

    /// Reads one split from disk.
    pub fn load(data_folder: &Path, dataset_name: &str, split: Split) -> Result<Dataset> {
        let path = Dataset::path_for(data_folder, dataset_name, split);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TrainError::dataset(format!("cannot read {}: {}", path.display(), e))
        })?;
        let dataset: Dataset = serde_json::from_str(&content).map_err(|e| {
            TrainError::dataset(format!("cannot parse {}: {}", path.display(), e))
        })?;
        dataset.validate()?;
        debug!(path = %path.display(), examples = dataset.len(), "Loaded {} split", split);
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn input_size(&self) -> usize {
        self.inputs.first().map_or(0, Vec::len)
    }

    pub fn label_count(&self) -> usize {
        self.targets.first().map_or(0, Vec::len)
    }

    fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(TrainError::dataset("dataset has no examples"));
        }
        if self.inputs.len() != self.targets.len() {
            return Err(TrainError::dataset(format!(
                "{} inputs but {} targets",
                self.inputs.len(),
                self.targets.len()
            )));
        }
        let (width, labels) = (self.input_size(), self.label_count());
        if width == 0 || labels == 0 {
            return Err(TrainError::dataset("examples must have at least one feature and one label"));
        }
        for (i, (x, y)) in self.inputs.iter().zip(&self.targets).enumerate() {
            if x.len() != width || y.len() != labels {
                return Err(TrainError::dataset(format!(
                    "example {} has shape ({}, {}), expected ({}, {})",
                    i,
                    x.len(),
                    y.len(),
                    width,
                    labels
                )));
            }
            if y.iter().any(|&t| t != 0.0 && t != 1.0) {
                return Err(TrainError::dataset(format!("example {} has a target outside {{0, 1}}", i)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_or_non_binary_examples() {
        assert!(Dataset::new(vec![vec![1.0], vec![1.0, 2.0]], vec![vec![1.0], vec![0.0]]).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![vec![0.5]]).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![]).is_err());
        assert!(Dataset::new(vec![], vec![]).is_err());
    }

    #[test]
    fn loads_split_file_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = Dataset::path_for(dir.path(), "tags", Split::Val);
        assert!(path.ends_with("VAL_tags.json"));
        std::fs::write(&path, r#"{"inputs": [[0.5, 1.0]], "targets": [[1, 0, 1]]}"#).unwrap();

        let ds = Dataset::load(dir.path(), "tags", Split::Val).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.input_size(), 2);
        assert_eq!(ds.label_count(), 3);
    }

    #[test]
    fn missing_split_is_a_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(dir.path(), "tags", Split::Train).unwrap_err();
        assert!(matches!(err, TrainError::Dataset(_)));
    }
}
