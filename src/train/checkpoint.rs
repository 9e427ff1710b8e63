//! Checkpoint persistence for training runs.
//!
//! Every completed epoch writes the "latest" slot; epochs that improve the
//! validation metric also write the "best" slot. Files are JSON envelopes
//! carrying a SHA-256 of the payload so truncated or edited files are
//! reported as corrupt instead of being half-loaded.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{CheckpointError, Result};
use crate::network::model::{Model, ModelState};
use crate::optim::optimizer::Optimizer;
use crate::train::state::TrainingState;

/// Snapshot of a run at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub created_at: DateTime<Utc>,
    /// Index of the epoch this snapshot closes.
    pub epoch: usize,
    pub epochs_since_improvement: usize,
    /// Validation accuracy of this epoch.
    pub accuracy: f64,
    /// Best validation accuracy of the run up to and including this epoch.
    pub best_accuracy: f64,
    pub is_best: bool,
    pub model: ModelState,
    pub optimizer: serde_json::Value,
}

impl Checkpoint {
    pub fn capture<M, O>(
        state: &TrainingState,
        accuracy: f64,
        is_best: bool,
        model: &M,
        optimizer: &O,
    ) -> Result<Checkpoint>
    where
        M: Model + ?Sized,
        O: Optimizer + ?Sized,
    {
        Ok(Checkpoint {
            created_at: Utc::now(),
            epoch: state.current_epoch,
            epochs_since_improvement: state.epochs_since_improvement,
            accuracy,
            best_accuracy: state.best_metric,
            is_best,
            model: model.state(),
            optimizer: optimizer.state()?,
        })
    }

    pub fn training_state(&self) -> TrainingState {
        TrainingState {
            current_epoch: self.epoch,
            epochs_since_improvement: self.epochs_since_improvement,
            best_metric: self.best_accuracy,
        }
    }

    /// Loads parameters and optimizer state into `model` and `optimizer`.
    /// The optimizer state is checked against the model's parameter shapes
    /// before anything is loaded.
    pub fn restore<M, O>(&self, model: &mut M, optimizer: &mut O) -> Result<TrainingState>
    where
        M: Model + ?Sized,
        O: Optimizer + ?Sized,
    {
        {
            let params = model.parameters();
            optimizer.load_state(&self.optimizer, &params)?;
        }
        model.load_state(&self.model)?;
        Ok(self.training_state())
    }
}

/// Which of the two persisted snapshots to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Latest,
    Best,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    checksum: String,
    payload: serde_json::Value,
}

/// Reads and writes the latest/best checkpoint files of one dataset inside
/// a directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    dataset_name: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, dataset_name: impl Into<String>) -> Self {
        Self { dir: dir.into(), dataset_name: dataset_name.into() }
    }

    /// `checkpoint_{dataset}.json` or `checkpoint_{dataset}_BEST.json`.
    pub fn path(&self, slot: Slot) -> PathBuf {
        let name = match slot {
            Slot::Latest => format!("checkpoint_{}.json", self.dataset_name),
            Slot::Best => format!("checkpoint_{}_BEST.json", self.dataset_name),
        };
        self.dir.join(name)
    }

    /// Writes the latest slot, and the best slot when `checkpoint.is_best`.
    pub fn save(&self, checkpoint: &Checkpoint) -> std::result::Result<(), CheckpointError> {
        let bytes = encode(checkpoint).map_err(|e| CheckpointError::Io {
            path: self.path(Slot::Latest),
            source: io::Error::other(e),
        })?;

        let latest = self.path(Slot::Latest);
        atomic_write(&latest, &bytes).map_err(|source| CheckpointError::Io { path: latest.clone(), source })?;
        debug!(path = %latest.display(), epoch = checkpoint.epoch, "Wrote latest checkpoint");

        if checkpoint.is_best {
            let best = self.path(Slot::Best);
            atomic_write(&best, &bytes).map_err(|source| CheckpointError::Io { path: best.clone(), source })?;
            info!(path = %best.display(), epoch = checkpoint.epoch, accuracy = checkpoint.accuracy, "New best checkpoint");
        }
        Ok(())
    }

    pub fn load(&self, slot: Slot) -> std::result::Result<Checkpoint, CheckpointError> {
        Self::load_path(&self.path(slot))
    }

    /// Reads a checkpoint file from an arbitrary path.
    pub fn load_path(path: &Path) -> std::result::Result<Checkpoint, CheckpointError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound { path: path.to_path_buf() });
            }
            Err(source) => return Err(CheckpointError::Io { path: path.to_path_buf(), source }),
        };
        decode(&bytes).map_err(|reason| CheckpointError::corrupt(path, reason))
    }

    /// Loads `path` into fresh `model`/`optimizer` instances and returns the
    /// training state to resume from. Schema mismatches are reported as
    /// corrupt.
    pub fn restore_path<M, O>(
        path: &Path,
        model: &mut M,
        optimizer: &mut O,
    ) -> std::result::Result<TrainingState, CheckpointError>
    where
        M: Model + ?Sized,
        O: Optimizer + ?Sized,
    {
        let checkpoint = Self::load_path(path)?;
        let state = checkpoint
            .restore(model, optimizer)
            .map_err(|e| CheckpointError::corrupt(path, e))?;
        info!(
            path = %path.display(),
            epoch = state.current_epoch,
            epochs_since_improvement = state.epochs_since_improvement,
            best_accuracy = state.best_metric,
            "Restored checkpoint"
        );
        Ok(state)
    }
}

fn checksum(payload: &serde_json::Value) -> serde_json::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(payload)?);
    Ok(format!("{:x}", hasher.finalize()))
}

fn encode(checkpoint: &Checkpoint) -> serde_json::Result<Vec<u8>> {
    let payload = serde_json::to_value(checkpoint)?;
    let envelope = Envelope { checksum: checksum(&payload)?, payload };
    serde_json::to_vec(&envelope)
}

fn decode(bytes: &[u8]) -> std::result::Result<Checkpoint, String> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let actual = checksum(&envelope.payload).map_err(|e| e.to_string())?;
    if actual != envelope.checksum {
        return Err(format!("checksum mismatch (stored {}, computed {})", envelope.checksum, actual));
    }
    serde_json::from_value(envelope.payload).map_err(|e| e.to_string())
}

/// Writes to a `.tmp` sibling, syncs, then renames over `path`, so readers
/// only ever see the previous or the new complete file. The directory is
/// synced afterwards so the rename itself survives a crash.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_dir(parent)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

// Directories cannot be opened as files here; rename durability is up to the OS.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;
    use crate::network::{model::Mode, network::Network, spec::NetworkSpec};
    use crate::optim::adam::Adam;
    use crate::layers::parameter::Parameter;

    fn spec() -> NetworkSpec {
        NetworkSpec { input_size: 3, hidden_layers: vec![4], output_size: 2, dropout: 0.1 }
    }

    fn trained_pair() -> (Network, Adam) {
        let mut net = Network::from_spec(&spec());
        let mut adam = Adam::new(0.01);
        for p in net.parameters_mut() {
            p.grad.fill(0.25);
        }
        let mut params: Vec<&mut Parameter> = net.parameters_mut();
        adam.step(&mut params);
        (net, adam)
    }

    fn checkpoint(epoch: usize, accuracy: f64, best: f64, is_best: bool) -> Checkpoint {
        let (net, adam) = trained_pair();
        let state = TrainingState { current_epoch: epoch, epochs_since_improvement: 0, best_metric: best };
        Checkpoint::capture(&state, accuracy, is_best, &net, &adam).unwrap()
    }

    #[test]
    fn missing_slot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "tags");
        assert!(matches!(store.load(Slot::Best), Err(CheckpointError::NotFound { .. })));
    }

    #[test]
    fn best_slot_written_only_for_improvements() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "tags");

        store.save(&checkpoint(0, 50.0, 50.0, true)).unwrap();
        store.save(&checkpoint(1, 40.0, 50.0, false)).unwrap();

        assert_eq!(store.load(Slot::Latest).unwrap().epoch, 1);
        let best = store.load(Slot::Best).unwrap();
        assert_eq!(best.epoch, 0);
        assert_eq!(best.accuracy, 50.0);
        assert!(!store.path(Slot::Latest).with_extension("tmp").exists());
    }

    #[test]
    fn round_trip_restores_identical_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "tags");
        let (mut net, adam) = trained_pair();
        let state = TrainingState { current_epoch: 5, epochs_since_improvement: 2, best_metric: 61.25 };
        store.save(&Checkpoint::capture(&state, 58.0, false, &net, &adam).unwrap()).unwrap();

        let mut fresh_net = Network::from_spec(&spec());
        let mut fresh_adam = Adam::new(0.5);
        let restored = CheckpointStore::restore_path(&store.path(Slot::Latest), &mut fresh_net, &mut fresh_adam).unwrap();
        assert_eq!(restored, state);
        assert_eq!(fresh_adam.state().unwrap(), adam.state().unwrap());

        let probe = Matrix::from_rows(&[vec![0.3, -1.2, 2.5], vec![1.0, 1.0, 1.0]]).unwrap();
        net.set_mode(Mode::Eval);
        fresh_net.set_mode(Mode::Eval);
        assert_eq!(net.forward(&probe), fresh_net.forward(&probe));
    }

    #[test]
    fn save_into_missing_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("runs").join("a"), "tags");
        store.save(&checkpoint(2, 30.0, 30.0, true)).unwrap();
        assert_eq!(store.load(Slot::Best).unwrap().epoch, 2);
        assert!(!store.path(Slot::Best).with_extension("tmp").exists());
    }

    #[test]
    fn failed_write_keeps_previous_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "tags");
        let first = checkpoint(0, 20.0, 20.0, true);
        store.save(&first).unwrap();

        fs::create_dir(store.path(Slot::Latest).with_extension("tmp")).unwrap();
        let err = store.save(&checkpoint(1, 30.0, 30.0, true)).unwrap_err();
        assert!(matches!(err, CheckpointError::Io { .. }));
        assert_eq!(store.load(Slot::Latest).unwrap(), first);
        assert_eq!(store.load(Slot::Best).unwrap(), first);
    }

    #[test]
    fn tampered_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "tags");
        store.save(&checkpoint(3, 10.0, 10.0, true)).unwrap();

        let path = store.path(Slot::Latest);
        let text = fs::read_to_string(&path).unwrap().replace("\"epoch\":3", "\"epoch\":4");
        fs::write(&path, text).unwrap();
        assert!(matches!(store.load(Slot::Latest), Err(CheckpointError::Corrupt { .. })));

        fs::write(&path, b"{\"checksum\":").unwrap();
        assert!(matches!(store.load(Slot::Latest), Err(CheckpointError::Corrupt { .. })));
    }

    #[test]
    fn other_architecture_is_corrupt_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "tags");
        store.save(&checkpoint(0, 10.0, 10.0, true)).unwrap();

        let mut wider = Network::from_spec(&NetworkSpec { hidden_layers: vec![8], ..spec() });
        let mut adam = Adam::new(0.01);
        let err = CheckpointStore::restore_path(&store.path(Slot::Best), &mut wider, &mut adam).unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }
}
