use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::optim::{adam::Adam, optimizer::Optimizer, sgd::Sgd};

/// Every tunable of a training run. Built once (TOML file plus CLI
/// overrides), validated, then handed to the orchestrator and never mutated.
///
/// Missing fields take the defaults from `TrainConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    /// Folder holding `TRAIN_{dataset_name}.json` and `VAL_{dataset_name}.json`.
    pub data_folder: PathBuf,
    /// Base name shared by data and checkpoint files.
    pub dataset_name: String,
    pub batch_size: usize,
    /// Epochs to train for if early stopping never triggers.
    pub max_epochs: usize,
    /// Stop once this many consecutive epochs pass without improvement.
    pub patience_limit: usize,
    /// Decay the learning rate every this many stagnant epochs.
    pub stagnation_decay_period: usize,
    pub decay_factor: f64,
    pub learning_rate: f64,
    /// Element-wise bound on gradient values.
    pub gradient_clip_bound: f64,
    /// Train every layer instead of only the output head.
    #[serde(alias = "fine_tune_flag")]
    pub fine_tune: bool,
    /// `None` starts a fresh run.
    pub resume_checkpoint_path: Option<PathBuf>,
    pub checkpoint_dir: PathBuf,
    /// Log batch progress every this many batches.
    pub print_freq: usize,
    /// Fixes batch shuffling order when set.
    pub seed: Option<u64>,
    pub model: ModelConfig,
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub hidden_layers: Vec<usize>,
    pub dropout: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam,
    Sgd {
        #[serde(default)]
        momentum: f64,
    },
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            data_folder: PathBuf::from("./data"),
            dataset_name: String::new(),
            batch_size: 32,
            max_epochs: 10,
            patience_limit: 20,
            stagnation_decay_period: 4,
            decay_factor: 0.8,
            learning_rate: 1e-4,
            gradient_clip_bound: 5.0,
            fine_tune: false,
            resume_checkpoint_path: None,
            checkpoint_dir: PathBuf::from("."),
            print_freq: 100,
            seed: None,
            model: ModelConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig { hidden_layers: vec![256], dropout: 0.15 }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam
    }
}

impl OptimizerConfig {
    pub fn build(&self, learning_rate: f64) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Adam => Box::new(Adam::new(learning_rate)),
            OptimizerConfig::Sgd { momentum } => Box::new(Sgd::with_momentum(learning_rate, momentum)),
        }
    }
}

impl TrainConfig {
    pub fn from_toml_str(content: &str) -> Result<TrainConfig> {
        toml::from_str(content).map_err(|e| TrainError::config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<TrainConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        TrainConfig::from_toml_str(&content)
    }

    /// Rejects values the training loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TrainError::config(format!("{name} must be a positive number, got {v}")))
            }
        };
        let at_least_one = |name: &str, v: usize| {
            if v >= 1 {
                Ok(())
            } else {
                Err(TrainError::config(format!("{name} must be at least 1")))
            }
        };

        if self.dataset_name.trim().is_empty() {
            return Err(TrainError::config("dataset_name must not be empty"));
        }
        at_least_one("batch_size", self.batch_size)?;
        at_least_one("max_epochs", self.max_epochs)?;
        at_least_one("patience_limit", self.patience_limit)?;
        at_least_one("stagnation_decay_period", self.stagnation_decay_period)?;
        at_least_one("print_freq", self.print_freq)?;
        positive("decay_factor", self.decay_factor)?;
        positive("learning_rate", self.learning_rate)?;
        positive("gradient_clip_bound", self.gradient_clip_bound)?;
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(TrainError::config(format!(
                "model.dropout must be in [0, 1), got {}",
                self.model.dropout
            )));
        }
        if self.model.hidden_layers.iter().any(|&w| w == 0) {
            return Err(TrainError::config("model.hidden_layers must not contain 0"));
        }
        if let OptimizerConfig::Sgd { momentum } = self.optimizer {
            if !(0.0..1.0).contains(&momentum) {
                return Err(TrainError::config(format!("sgd momentum must be in [0, 1), got {momentum}")));
            }
        }
        Ok(())
    }
}
