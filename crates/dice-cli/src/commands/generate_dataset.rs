//! Generate-dataset command implementation
//!
//! Assembles a dataset from a folder of recorded JSON patterns, their
//! augmented copies, and optional purely random patterns, then writes it to
//! `<out_root>/<id>/<id>.json`.

use anyhow::{Context, Result};
use colored::Colorize;
use dice_datasets::{AssemblyOptions, AssemblyReport, DatasetAssembly, Device};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use super::reporting;

/// Arguments for `dice generate-dataset`.
#[derive(Debug, Clone)]
pub struct GenerateDatasetArgs {
    pub id: String,
    /// Folder of recorded `*.json` patterns. `None` generates random patterns only.
    pub patterns: Option<PathBuf>,
    pub preset: String,
    pub presets_dir: PathBuf,
    pub augmentation_factor: usize,
    pub random: usize,
    pub seed: u32,
    pub device: Device,
    pub out_root: PathBuf,
}

/// Machine-readable summary of a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDatasetOutput {
    pub id: String,
    pub preset: String,
    pub dataset_path: String,
    pub patterns: usize,
    pub instruments: Option<usize>,
    pub timesteps: Option<usize>,
    pub report: AssemblyReport,
    pub duration_ms: u64,
}

/// Run the generate-dataset command
pub fn run(args: &GenerateDatasetArgs, json_output: bool) -> Result<ExitCode> {
    let output = generate(args, !json_output)?;

    if json_output {
        reporting::print_json(&output)?;
    } else {
        print_report(&output.report, Path::new(&output.dataset_path));
        println!(
            "\n{} {} patterns ({}ms)",
            "SUCCESS".green().bold(),
            output.patterns,
            output.duration_ms
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Assembles and writes the dataset. With `verbose` set, prints the run
/// header first.
pub fn generate(args: &GenerateDatasetArgs, verbose: bool) -> Result<GenerateDatasetOutput> {
    let start = Instant::now();
    let (preset_path, config) = reporting::load_preset(&args.preset, &args.presets_dir)?;

    if verbose {
        println!("{} {}", "Generating dataset:".cyan().bold(), args.id);
        reporting::print_field("Preset", preset_path.display());
        if let Some(folder) = &args.patterns {
            reporting::print_field("Patterns", folder.display());
        }
        reporting::print_field("Device", args.device);
    }

    let options = AssemblyOptions {
        augmentation_factor: args.augmentation_factor,
        random_count: args.random,
        seed: args.seed,
        device: args.device,
    };
    let assembly = DatasetAssembly::new(config, options);
    let (dataset, report) = match &args.patterns {
        Some(folder) => assembly
            .from_folder(folder)
            .with_context(|| format!("Failed to assemble dataset from: {}", folder.display()))?,
        None => assembly.assemble(&[]).context("Failed to generate dataset")?,
    };

    if dataset.is_empty() {
        anyhow::bail!(
            "no patterns produced; pass --patterns with JSON files or --random with a count"
        );
    }
    let shape = dataset.grid_shape().context("Dataset mixes pattern shapes")?;

    let destination = reporting::dataset_path(&args.out_root, &args.id);
    reporting::ensure_parent(&destination)?;
    dataset
        .save(&destination)
        .with_context(|| format!("Failed to write dataset: {}", destination.display()))?;

    Ok(GenerateDatasetOutput {
        id: args.id.clone(),
        preset: preset_path.display().to_string(),
        dataset_path: destination.display().to_string(),
        patterns: dataset.len(),
        instruments: shape.map(|(instruments, _)| instruments),
        timesteps: shape.map(|(_, timesteps)| timesteps),
        report,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn print_report(report: &AssemblyReport, destination: &Path) {
    println!();
    reporting::print_field("Sources", report.sources);
    reporting::print_field("Loaded", report.loaded);
    reporting::print_field(
        "Augmented",
        format!("{} ({} unchanged)", report.augmented, report.unchanged),
    );
    if report.invalid_sources > 0 {
        println!(
            "  {} {} augmentation(s) skipped on sources outside the polyphony bounds",
            "!".yellow(),
            report.invalid_sources
        );
    }
    if report.interrupted > 0 {
        println!(
            "  {} {} augmentation(s) stopped on an invalid replacement",
            "!".yellow(),
            report.interrupted
        );
    }
    if report.generated > 0 {
        reporting::print_field(
            "Generated",
            format!(
                "{} ({} candidates drawn)",
                report.generated, report.generation_attempts
            ),
        );
    }
    reporting::print_field("Written", destination.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use dice_datasets::PatternDataset;
    use std::fs;

    const PRESET: &str = r#"{
        "max_polyphony": 2,
        "max_num_events_with_full_polyphony": 4,
        "random_sequence_configs": [
            {"label": "HH", "length_in_clusters": 2,
             "weighted_clusters": [{"triggers": [1, 0, 1, 0]}, {"triggers": [0, 0, 0, 0]}]},
            {"label": "SD", "length_in_clusters": 2,
             "weighted_clusters": [{"triggers": [0, 0, 1, 0]}, {"triggers": [0, 0, 0, 0]}]},
            {"label": "BD", "length_in_clusters": 2,
             "weighted_clusters": [{"triggers": [1, 0, 0, 0]}]}
        ]
    }"#;

    fn args(root: &Path) -> GenerateDatasetArgs {
        GenerateDatasetArgs {
            id: "test".to_string(),
            patterns: Some(root.join("json")),
            preset: "groove".to_string(),
            presets_dir: root.join("presets"),
            augmentation_factor: 2,
            random: 3,
            seed: 5,
            device: Device::Cpu,
            out_root: root.join("dist"),
        }
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("presets")).unwrap();
        fs::create_dir_all(dir.path().join("json")).unwrap();
        fs::write(dir.path().join("presets").join("groove.json"), PRESET).unwrap();
        fs::write(
            dir.path().join("json").join("one.json"),
            r#"{"triggers": {"BD": [1,0,0,0,1,0,0,0], "SD": [0,0,0,0,1,0,0,0], "HH": [0,0,0,0,0,0,0,0]}}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_writes_dataset() {
        let dir = workspace();
        let code = run(&args(dir.path()), true).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let dataset =
            PatternDataset::load(dir.path().join("dist").join("test").join("test.json")).unwrap();
        assert_eq!(dataset.len(), 1 + 2 + 3);
        assert_eq!(dataset.grid_shape().unwrap(), Some((3, 8)));
    }

    #[test]
    fn test_random_only() {
        let dir = workspace();
        let args = GenerateDatasetArgs {
            patterns: None,
            ..args(dir.path())
        };
        run(&args, true).unwrap();
        let dataset =
            PatternDataset::load(dir.path().join("dist").join("test").join("test.json")).unwrap();
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn test_nothing_to_generate_fails() {
        let dir = workspace();
        let args = GenerateDatasetArgs {
            patterns: None,
            random: 0,
            ..args(dir.path())
        };
        assert!(run(&args, true).is_err());
    }

    #[test]
    fn test_missing_preset_fails() {
        let dir = workspace();
        let args = GenerateDatasetArgs {
            preset: "missing".to_string(),
            ..args(dir.path())
        };
        let err = run(&args, true).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
