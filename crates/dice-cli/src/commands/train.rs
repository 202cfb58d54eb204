//! Train command implementation
//!
//! Trains a denoising model on a generated dataset and writes a checkpoint
//! next to it.

use anyhow::{Context, Result};
use colored::Colorize;
use dice_datasets::{create_rng, Device, PatternDataset};
use dice_models::{
    create_loss, create_model, DiceArchitecture, DiceLoss, EpochStats, ModelCheckpoint, Trainer,
    TrainingConfig,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use super::reporting;

/// Arguments for `dice train`.
#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub id: String,
    pub preset: String,
    pub presets_dir: PathBuf,
    /// Dataset file. Defaults to `<out_root>/<id>/<id>.json`.
    pub dataset: Option<PathBuf>,
    pub architecture: DiceArchitecture,
    pub loss: DiceLoss,
    pub training: TrainingConfig,
    pub device: Device,
    pub out_root: PathBuf,
}

/// Machine-readable summary of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutput {
    pub id: String,
    pub architecture: DiceArchitecture,
    pub loss: DiceLoss,
    pub parameters: usize,
    pub epochs: Vec<EpochStats>,
    pub accuracy: Option<f64>,
    pub checkpoint_path: String,
    pub duration_ms: u64,
}

/// Run the train command
pub fn run(args: &TrainArgs, json_output: bool) -> Result<ExitCode> {
    let output = train(args, !json_output)?;

    if json_output {
        reporting::print_json(&output)?;
    } else {
        match output.accuracy {
            Some(accuracy) => println!(
                "\n{} {:.2}",
                "Final Accuracy:".green().bold(),
                accuracy
            ),
            None => println!(
                "\n{} test split is empty, accuracy not measured",
                "!".yellow()
            ),
        }
        println!(
            "{} {} ({}ms)",
            "Saved at".yellow(),
            output.checkpoint_path,
            output.duration_ms
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Trains and writes the checkpoint. With `verbose` set, prints the run
/// header and one line per epoch.
pub fn train(args: &TrainArgs, verbose: bool) -> Result<TrainOutput> {
    let start = Instant::now();
    let (_, config) = reporting::load_preset(&args.preset, &args.presets_dir)?;

    let dataset_path = args
        .dataset
        .clone()
        .unwrap_or_else(|| reporting::dataset_path(&args.out_root, &args.id));
    let dataset = PatternDataset::load(&dataset_path)
        .with_context(|| format!("Failed to load dataset: {}", dataset_path.display()))?;

    let mut model = create_model(
        args.architecture,
        config.instrument_count(),
        config.timestep_count(),
        &mut create_rng(args.training.seed),
    )?;
    let loss = create_loss(args.loss, config.bounds);

    if verbose {
        println!("{} {}", "Training:".cyan().bold(), args.id);
        reporting::print_field("Dataset", format!("{} ({} patterns)", dataset_path.display(), dataset.len()));
        reporting::print_field(
            "Model",
            format!("{} ({} parameters)", args.architecture, model.parameter_count()),
        );
        reporting::print_field("Loss", args.loss);
        reporting::print_field("Device", args.device);
        println!();
    }

    let trainer = Trainer::new(args.training.clone(), args.device);
    let report = trainer
        .train(&dataset, model.as_mut(), loss.as_ref(), |stats| {
            if verbose {
                print_epoch(stats);
            }
        })
        .context("Training failed")?;

    let destination = reporting::checkpoint_path(
        &args.out_root,
        &args.id,
        args.architecture.as_str(),
        args.loss.as_str(),
    );
    reporting::ensure_parent(&destination)?;
    ModelCheckpoint::capture(model.as_ref(), args.loss, args.training.clone(), report.accuracy)
        .save(&destination)
        .with_context(|| format!("Failed to write checkpoint: {}", destination.display()))?;

    Ok(TrainOutput {
        id: args.id.clone(),
        architecture: args.architecture,
        loss: args.loss,
        parameters: model.parameter_count(),
        epochs: report.epochs,
        accuracy: report.accuracy,
        checkpoint_path: destination.display().to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn print_epoch(stats: &EpochStats) {
    let validation = stats
        .validation_loss
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {} {} {}",
        format!("Epoch {}/{}", stats.epoch, stats.epochs).cyan(),
        format!("entries {}", stats.samples_seen).green(),
        format!("loss {:.4}", stats.train_loss).red(),
        format!("validation loss {}", validation).purple(),
    );
}
