use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use ferrite_tagger::{
    BceLoss, CheckpointStore, DataLoader, Dataset, Network, NetworkSpec, RunOutcome, Slot,
    Split, StartFrom, TrainConfig, TrainingOrchestrator,
};

#[derive(Parser, Debug)]
#[command(name = "ferrite-tagger")]
#[command(about = "Train a multi-label tagger with early stopping and resumable checkpoints", version)]
struct Args {
    /// TOML file with training options
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    data_folder: Option<PathBuf>,

    #[arg(long)]
    dataset_name: Option<String>,

    #[arg(long)]
    max_epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Checkpoint file to resume from
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Train every layer, not only the output head
    #[arg(long)]
    fine_tune: bool,

    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_toml_file(path)?,
            None => TrainConfig::default(),
        };
        if let Some(v) = self.data_folder {
            config.data_folder = v;
        }
        if let Some(v) = self.dataset_name {
            config.dataset_name = v;
        }
        if let Some(v) = self.max_epochs {
            config.max_epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.checkpoint_dir {
            config.checkpoint_dir = v;
        }
        if let Some(v) = self.resume {
            config.resume_checkpoint_path = Some(v);
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
        config.fine_tune |= self.fine_tune;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Args::parse().into_config().context("Invalid configuration")?;

    let train_set = Dataset::load(&config.data_folder, &config.dataset_name, Split::Train)?;
    let val_set = Dataset::load(&config.data_folder, &config.dataset_name, Split::Val)?;
    if (train_set.input_size(), train_set.label_count()) != (val_set.input_size(), val_set.label_count()) {
        bail!(
            "TRAIN examples are {}→{} but VAL examples are {}→{}",
            train_set.input_size(),
            train_set.label_count(),
            val_set.input_size(),
            val_set.label_count()
        );
    }

    let spec = NetworkSpec {
        input_size: train_set.input_size(),
        hidden_layers: config.model.hidden_layers.clone(),
        output_size: train_set.label_count(),
        dropout: config.model.dropout,
    };
    let mut model = Network::from_spec(&spec);
    model.set_fine_tune(config.fine_tune);
    let mut optimizer = config.optimizer.build(config.learning_rate);

    let start = match &config.resume_checkpoint_path {
        None => StartFrom::Fresh,
        Some(path) => {
            let state = CheckpointStore::restore_path(path, &mut model, &mut optimizer)
                .with_context(|| format!("Cannot resume from {}", path.display()))?;
            StartFrom::Resume(state)
        }
    };

    let seed = start.shuffle_seed(config.seed);
    let mut train_loader = DataLoader::new(train_set, Split::Train, config.batch_size, seed);
    let mut val_loader = DataLoader::new(val_set, Split::Val, config.batch_size, seed);

    let mut orchestrator = TrainingOrchestrator::new(config, model, optimizer, Box::new(BceLoss))?;
    let report = orchestrator.run(start, &mut train_loader, &mut val_loader)?;

    match report.outcome {
        RunOutcome::Completed => info!(epochs = report.epochs_run, "Reached max epochs"),
        RunOutcome::StoppedEarly => info!(epochs = report.epochs_run, "Stopped early"),
    }
    info!(
        best_accuracy = report.state.best_metric,
        best_checkpoint = %orchestrator.store().path(Slot::Best).display(),
        "Done"
    );
    Ok(())
}
