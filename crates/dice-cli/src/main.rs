//! DICE CLI - Command-line interface for drum pattern datasets and models
//!
//! This binary provides commands for generating pattern datasets, training
//! denoising models on them, running experiment sweeps, and validating
//! presets and pattern files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dice_cli::commands;
use dice_cli::commands::experiments::ExperimentsArgs;
use dice_cli::commands::generate_dataset::GenerateDatasetArgs;
use dice_cli::commands::reporting::{DEFAULT_OUT_ROOT, DEFAULT_PRESETS_DIR};
use dice_cli::commands::train::TrainArgs;
use dice_datasets::Device;
use dice_models::{DiceArchitecture, DiceLoss, TrainingConfig};

/// DICE - Drum pattern datasets and denoising models
#[derive(Parser)]
#[command(name = "dice")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a dataset from recorded patterns, augmentation, and random generation
    GenerateDataset {
        /// Dataset identifier (output goes to <out_root>/<id>/<id>.json)
        #[arg(long)]
        id: String,

        /// Folder containing recorded patterns in JSON format
        #[arg(short, long)]
        patterns: Option<PathBuf>,

        /// Copies per recorded pattern with empty sequences filled at random
        #[arg(short, long, default_value_t = 0)]
        augmentation_factor: usize,

        /// Generation preset (name in the presets directory, or a path)
        #[arg(long)]
        preset: String,

        /// Directory holding named presets
        #[arg(long, default_value = DEFAULT_PRESETS_DIR)]
        presets_dir: PathBuf,

        /// Purely random patterns to append
        #[arg(short, long, default_value_t = 0)]
        random: usize,

        /// Base seed for augmentation and generation
        #[arg(long, default_value_t = 0)]
        seed: u32,

        /// Compute device (cpu, cpu:auto, cpu:N)
        #[arg(long, default_value = "cpu")]
        device: Device,

        /// Output root directory
        #[arg(short, long, default_value = DEFAULT_OUT_ROOT)]
        out_root: PathBuf,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Train a denoising model on a generated dataset
    Train {
        /// Dataset identifier used by generate-dataset
        #[arg(long)]
        id: String,

        /// Generation preset the dataset was built with
        #[arg(long)]
        preset: String,

        /// Directory holding named presets
        #[arg(long, default_value = DEFAULT_PRESETS_DIR)]
        presets_dir: PathBuf,

        /// Dataset file (default: <out_root>/<id>/<id>.json)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Model architecture (dense_auto_enc, linear_denoiser)
        #[arg(long)]
        architecture: DiceArchitecture,

        /// Loss function (mse_poly_penalty, l1_poly_penalty)
        #[arg(long)]
        loss: DiceLoss,

        /// Standard deviation of the input noise
        #[arg(long, default_value_t = 0.5)]
        noise_level: f32,

        /// Batch size
        #[arg(long, default_value_t = 32)]
        batch_size: usize,

        /// Number of training epochs
        #[arg(long, default_value_t = 5)]
        epochs: usize,

        /// Learning rate
        #[arg(long, default_value_t = 0.001)]
        learning_rate: f32,

        /// Seed for weight initialisation, the data split, and noise
        #[arg(long, default_value_t = 0)]
        seed: u32,

        /// Compute device (cpu, cpu:auto, cpu:N)
        #[arg(long, default_value = "cpu")]
        device: Device,

        /// Output root directory
        #[arg(short, long, default_value = DEFAULT_OUT_ROOT)]
        out_root: PathBuf,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Run a sweep of dataset generation and training experiments from a JSON file
    Experiments {
        /// Experiments file (a JSON list of experiment entries)
        #[arg(short, long, default_value = "experiments.json")]
        file: PathBuf,

        /// Folder containing recorded patterns in JSON format
        #[arg(short, long)]
        patterns: Option<PathBuf>,

        /// Directory holding named presets
        #[arg(long, default_value = DEFAULT_PRESETS_DIR)]
        presets_dir: PathBuf,

        /// Compute device (cpu, cpu:auto, cpu:N)
        #[arg(long, default_value = "cpu")]
        device: Device,

        /// Output root directory (summary goes to <out_root>/summary.json)
        #[arg(short, long, default_value = DEFAULT_OUT_ROOT)]
        out_root: PathBuf,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Validate a preset and optionally pattern files against it
    Validate {
        /// Generation preset (name in the presets directory, or a path)
        #[arg(long)]
        preset: String,

        /// Directory holding named presets
        #[arg(long, default_value = DEFAULT_PRESETS_DIR)]
        presets_dir: PathBuf,

        /// Pattern files to check against the preset (repeatable)
        #[arg(short, long)]
        pattern: Vec<PathBuf>,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::GenerateDataset {
            id,
            patterns,
            augmentation_factor,
            preset,
            presets_dir,
            random,
            seed,
            device,
            out_root,
            json,
        } => commands::generate_dataset::run(
            &GenerateDatasetArgs {
                id,
                patterns,
                preset,
                presets_dir,
                augmentation_factor,
                random,
                seed,
                device,
                out_root,
            },
            json,
        ),
        Commands::Train {
            id,
            preset,
            presets_dir,
            dataset,
            architecture,
            loss,
            noise_level,
            batch_size,
            epochs,
            learning_rate,
            seed,
            device,
            out_root,
            json,
        } => commands::train::run(
            &TrainArgs {
                id,
                preset,
                presets_dir,
                dataset,
                architecture,
                loss,
                training: TrainingConfig {
                    noise_level,
                    batch_size,
                    epochs,
                    learning_rate,
                    seed,
                    ..TrainingConfig::default()
                },
                device,
                out_root,
            },
            json,
        ),
        Commands::Experiments {
            file,
            patterns,
            presets_dir,
            device,
            out_root,
            json,
        } => commands::experiments::run(
            &ExperimentsArgs {
                file,
                patterns,
                presets_dir,
                device,
                out_root,
            },
            json,
        ),
        Commands::Validate {
            preset,
            presets_dir,
            pattern,
            json,
        } => commands::validate::run(&preset, &presets_dir, &pattern, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_generate_dataset() {
        let cli = Cli::try_parse_from([
            "dice",
            "generate-dataset",
            "--id",
            "groove",
            "--patterns",
            "./json",
            "--augmentation-factor",
            "4",
            "--preset",
            "basic",
            "--device",
            "cpu:4",
        ])
        .unwrap();
        match cli.command {
            Commands::GenerateDataset {
                id,
                patterns,
                augmentation_factor,
                preset,
                presets_dir,
                random,
                device,
                out_root,
                json,
                ..
            } => {
                assert_eq!(id, "groove");
                assert_eq!(patterns, Some(PathBuf::from("./json")));
                assert_eq!(augmentation_factor, 4);
                assert_eq!(preset, "basic");
                assert_eq!(presets_dir, PathBuf::from("presets"));
                assert_eq!(random, 0);
                assert_eq!(device, Device::CpuParallel { threads: 4 });
                assert_eq!(out_root, PathBuf::from("dist"));
                assert!(!json);
            }
            _ => panic!("expected generate-dataset command"),
        }
    }

    #[test]
    fn test_cli_parses_train_defaults() {
        let cli = Cli::try_parse_from([
            "dice",
            "train",
            "--id",
            "groove",
            "--preset",
            "basic",
            "--architecture",
            "dense_auto_enc",
            "--loss",
            "mse_poly_penalty",
        ])
        .unwrap();
        match cli.command {
            Commands::Train {
                architecture,
                loss,
                noise_level,
                batch_size,
                epochs,
                learning_rate,
                device,
                ..
            } => {
                assert_eq!(architecture, DiceArchitecture::DenseAutoencoder);
                assert_eq!(loss, DiceLoss::MsePolyphonyPenalty);
                assert_eq!(noise_level, 0.5);
                assert_eq!(batch_size, 32);
                assert_eq!(epochs, 5);
                assert_eq!(learning_rate, 0.001);
                assert_eq!(device, Device::Cpu);
            }
            _ => panic!("expected train command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_architecture() {
        let result = Cli::try_parse_from([
            "dice",
            "train",
            "--id",
            "groove",
            "--preset",
            "basic",
            "--architecture",
            "att_unet",
            "--loss",
            "mse_poly_penalty",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_experiments_defaults() {
        let cli = Cli::try_parse_from(["dice", "experiments", "--patterns", "./json"]).unwrap();
        match cli.command {
            Commands::Experiments {
                file,
                patterns,
                device,
                out_root,
                json,
                ..
            } => {
                assert_eq!(file, PathBuf::from("experiments.json"));
                assert_eq!(patterns, Some(PathBuf::from("./json")));
                assert_eq!(device, Device::Cpu);
                assert_eq!(out_root, PathBuf::from("dist"));
                assert!(!json);
            }
            _ => panic!("expected experiments command"),
        }
    }

    #[test]
    fn test_cli_parses_validate_patterns() {
        let cli = Cli::try_parse_from([
            "dice",
            "validate",
            "--preset",
            "presets/basic.json",
            "-p",
            "a.json",
            "-p",
            "b.json",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate {
                preset,
                pattern,
                json,
                ..
            } => {
                assert_eq!(preset, "presets/basic.json");
                assert_eq!(pattern.len(), 2);
                assert!(json);
            }
            _ => panic!("expected validate command"),
        }
    }
}
