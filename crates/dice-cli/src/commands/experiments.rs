//! Experiments command implementation
//!
//! Runs a sweep of dataset generation plus training runs described in a JSON
//! file, recording a status per experiment in `<out_root>/summary.json`. A
//! failed experiment does not stop the sweep.

use anyhow::{Context, Result};
use colored::Colorize;
use dice_datasets::Device;
use dice_models::{DiceArchitecture, DiceLoss, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use super::generate_dataset::{self, GenerateDatasetArgs};
use super::reporting;
use super::train::{self, TrainArgs};

/// File name of the sweep summary under the output root.
pub const SUMMARY_FILE: &str = "summary.json";

/// One entry of the experiments file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Experiment {
    pub id: String,
    pub architecture: DiceArchitecture,
    pub loss: DiceLoss,
    /// Preset used both for augmentation and for the model's grid shape.
    pub augmentation_preset: String,
    pub augmentation_factor: usize,
    pub noise_level: f32,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    /// Purely random patterns appended to the dataset.
    #[serde(default)]
    pub random: usize,
    #[serde(default)]
    pub seed: u32,
}

/// Arguments for `dice experiments`.
#[derive(Debug, Clone)]
pub struct ExperimentsArgs {
    pub file: PathBuf,
    pub patterns: Option<PathBuf>,
    pub presets_dir: PathBuf,
    pub device: Device,
    pub out_root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Ok,
    DatasetFailed,
    TrainFailed,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Ok => "ok",
            ExperimentStatus::DatasetFailed => "dataset_failed",
            ExperimentStatus::TrainFailed => "train_failed",
        }
    }
}

/// Outcome of a single experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: String,
    pub status: ExperimentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<String>,
    pub duration_ms: u64,
}

/// Machine-readable sweep summary, also written to [`SUMMARY_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentsSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub experiments: Vec<ExperimentResult>,
}

/// Run the experiments command
///
/// # Returns
/// Exit code: 0 if every experiment succeeded, 1 otherwise
pub fn run(args: &ExperimentsArgs, json_output: bool) -> Result<ExitCode> {
    let experiments = load_experiments(&args.file)?;

    let results: Vec<ExperimentResult> = experiments
        .iter()
        .map(|experiment| {
            if !json_output {
                println!("{} {}", "Experiment:".cyan().bold(), experiment.id);
            }
            let result = run_experiment(experiment, args, !json_output);
            if !json_output {
                print_result(&result);
            }
            result
        })
        .collect();

    let failed = results
        .iter()
        .filter(|r| r.status != ExperimentStatus::Ok)
        .count();
    let summary = ExperimentsSummary {
        succeeded: results.len() - failed,
        failed,
        experiments: results,
    };

    let summary_path = args.out_root.join(SUMMARY_FILE);
    reporting::write_json(&summary, &summary_path)?;

    if json_output {
        reporting::print_json(&summary)?;
    } else if failed == 0 {
        println!(
            "\n{} {} experiment(s), summary at {}",
            "SUCCESS".green().bold(),
            summary.succeeded,
            summary_path.display()
        );
    } else {
        println!(
            "\n{} {} of {} experiment(s) failed, summary at {}",
            "FAILED".red().bold(),
            failed,
            summary.experiments.len(),
            summary_path.display()
        );
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Reads the experiments file. Every entry must carry the required keys and
/// ids must be unique, since they name the output directories.
pub fn load_experiments(path: &Path) -> Result<Vec<Experiment>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read experiments file: {}", path.display()))?;
    let experiments: Vec<Experiment> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse experiments file: {}", path.display()))?;

    let mut seen = HashSet::new();
    for experiment in &experiments {
        if !seen.insert(experiment.id.as_str()) {
            anyhow::bail!("duplicate experiment id '{}'", experiment.id);
        }
    }
    Ok(experiments)
}

fn run_experiment(
    experiment: &Experiment,
    args: &ExperimentsArgs,
    verbose: bool,
) -> ExperimentResult {
    let start = Instant::now();
    let failure = |status, error: anyhow::Error| ExperimentResult {
        id: experiment.id.clone(),
        status,
        error: Some(format!("{:#}", error)),
        accuracy: None,
        checkpoint_path: None,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    let dataset_args = GenerateDatasetArgs {
        id: experiment.id.clone(),
        patterns: args.patterns.clone(),
        preset: experiment.augmentation_preset.clone(),
        presets_dir: args.presets_dir.clone(),
        augmentation_factor: experiment.augmentation_factor,
        random: experiment.random,
        seed: experiment.seed,
        device: args.device,
        out_root: args.out_root.clone(),
    };
    if let Err(e) = generate_dataset::generate(&dataset_args, verbose) {
        return failure(ExperimentStatus::DatasetFailed, e);
    }

    let train_args = TrainArgs {
        id: experiment.id.clone(),
        preset: experiment.augmentation_preset.clone(),
        presets_dir: args.presets_dir.clone(),
        dataset: None,
        architecture: experiment.architecture,
        loss: experiment.loss,
        training: TrainingConfig {
            noise_level: experiment.noise_level,
            batch_size: experiment.batch_size,
            epochs: experiment.epochs,
            learning_rate: experiment.learning_rate,
            seed: experiment.seed,
            ..TrainingConfig::default()
        },
        device: args.device,
        out_root: args.out_root.clone(),
    };
    match train::train(&train_args, verbose) {
        Ok(output) => ExperimentResult {
            id: experiment.id.clone(),
            status: ExperimentStatus::Ok,
            error: None,
            accuracy: output.accuracy,
            checkpoint_path: Some(output.checkpoint_path),
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => failure(ExperimentStatus::TrainFailed, e),
    }
}

fn print_result(result: &ExperimentResult) {
    match (&result.status, &result.error) {
        (ExperimentStatus::Ok, _) => {
            let accuracy = result
                .accuracy
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {} accuracy {} ({}ms)\n",
                "ok".green(),
                result.id,
                accuracy,
                result.duration_ms
            );
        }
        (status, error) => println!(
            "  {} {} {}: {}\n",
            "x".red(),
            result.id,
            status.as_str(),
            error.as_deref().unwrap_or("unknown error")
        ),
    }
}
