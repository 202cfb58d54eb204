//! Validate command implementation
//!
//! Checks that a preset parses and, optionally, that pattern files match the
//! preset's grid shape and polyphony bounds.

use anyhow::Result;
use colored::Colorize;
use dice_datasets::{Pattern, RandomPatternConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::reporting;

/// Verdict for one pattern file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCheck {
    pub path: String,
    pub ok: bool,
    /// Per-timestep trigger counts, present when the file parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyphony: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Machine-readable validation summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateOutput {
    pub ok: bool,
    pub preset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timesteps: Option<usize>,
    pub patterns: Vec<PatternCheck>,
}

/// Run the validate command
///
/// # Returns
/// Exit code: 0 if the preset and every pattern are valid, 1 otherwise
pub fn run(
    preset: &str,
    presets_dir: &Path,
    patterns: &[PathBuf],
    json_output: bool,
) -> Result<ExitCode> {
    let output = validate(preset, presets_dir, patterns);

    if json_output {
        reporting::print_json(&output)?;
    } else {
        print_human(&output);
    }

    Ok(if output.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Validates the preset and each pattern file without printing.
pub fn validate(preset: &str, presets_dir: &Path, patterns: &[PathBuf]) -> ValidateOutput {
    let preset_path = reporting::resolve_preset(preset, presets_dir);
    let config = match RandomPatternConfig::from_json_path(&preset_path) {
        Ok(config) => config,
        Err(e) => {
            return ValidateOutput {
                ok: false,
                preset: preset_path.display().to_string(),
                preset_error: Some(format!("[{}] {}", e.code(), e)),
                labels: None,
                timesteps: None,
                patterns: Vec::new(),
            };
        }
    };

    let checks: Vec<PatternCheck> = patterns
        .iter()
        .map(|path| check_pattern(path, &config))
        .collect();

    ValidateOutput {
        ok: checks.iter().all(|c| c.ok),
        preset: preset_path.display().to_string(),
        preset_error: None,
        labels: Some(config.labels().into_iter().map(String::from).collect()),
        timesteps: Some(config.timestep_count()),
        patterns: checks,
    }
}

fn check_pattern(path: &Path, config: &RandomPatternConfig) -> PatternCheck {
    let display = path.display().to_string();
    let pattern = match Pattern::from_json_path(path) {
        Ok(pattern) => pattern,
        Err(e) => {
            return PatternCheck {
                path: display,
                ok: false,
                polyphony: None,
                error: Some(format!("[{}] {}", e.code(), e)),
            };
        }
    };

    let polyphony = Some(pattern.polyphony().to_vec());
    let expected = (config.instrument_count(), config.timestep_count());
    let found = (pattern.instrument_count(), pattern.timestep_count());
    let error = if found != expected {
        Some(format!(
            "pattern is {}x{}, preset expects {}x{}",
            found.0, found.1, expected.0, expected.1
        ))
    } else if !pattern.valid_polyphony_requirements(&config.bounds) {
        Some(format!(
            "exceeds polyphony bounds (max {}, at most {} full timesteps)",
            config.bounds.max_polyphony, config.bounds.max_num_events_with_full_polyphony
        ))
    } else {
        None
    };

    PatternCheck {
        path: display,
        ok: error.is_none(),
        polyphony,
        error,
    }
}

fn print_human(output: &ValidateOutput) {
    println!("{} {}", "Validating:".cyan().bold(), output.preset);

    if let Some(error) = &output.preset_error {
        println!("  {} {}", "x".red(), error);
        println!("\n{} Preset is invalid", "FAILED".red().bold());
        return;
    }
    if let (Some(labels), Some(timesteps)) = (&output.labels, output.timesteps) {
        reporting::print_field("Instruments", labels.join(", "));
        reporting::print_field("Timesteps", timesteps);
    }

    for check in &output.patterns {
        match &check.error {
            None => println!("  {} {}", "ok".green(), check.path),
            Some(error) => println!("  {} {}: {}", "x".red(), check.path, error),
        }
    }

    let failed = output.patterns.iter().filter(|c| !c.ok).count();
    if failed == 0 {
        println!("\n{} Preset is valid", "SUCCESS".green().bold());
    } else {
        println!(
            "\n{} {} of {} pattern(s) invalid",
            "FAILED".red().bold(),
            failed,
            output.patterns.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const PRESET: &str = r#"{
        "max_polyphony": 2,
        "max_num_events_with_full_polyphony": 1,
        "random_sequence_configs": [
            {"label": "SD", "length_in_clusters": 1,
             "weighted_clusters": [{"triggers": [0, 0, 1, 0]}]},
            {"label": "BD", "length_in_clusters": 1,
             "weighted_clusters": [{"triggers": [1, 0, 0, 0]}]}
        ]
    }"#;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("preset.json"), PRESET).unwrap();
        fs::write(
            dir.path().join("good.json"),
            r#"{"triggers": {"BD": [1,0,0,0], "SD": [1,0,1,0]}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("crowded.json"),
            r#"{"triggers": {"BD": [1,0,1,0], "SD": [1,0,1,0]}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("short.json"),
            r#"{"triggers": {"BD": [1,0], "SD": [0,0]}}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_valid_preset_and_pattern() {
        let dir = workspace();
        let output = validate(
            dir.path().join("preset.json").to_str().unwrap(),
            dir.path(),
            &[dir.path().join("good.json")],
        );
        assert!(output.ok);
        assert_eq!(output.labels, Some(vec!["BD".to_string(), "SD".to_string()]));
        assert_eq!(output.patterns[0].polyphony, Some(vec![2.0, 0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_pattern_failures() {
        let dir = workspace();
        let output = validate(
            "preset",
            dir.path(),
            &[dir.path().join("crowded.json"), dir.path().join("short.json")],
        );
        assert!(!output.ok);
        assert!(output.patterns[0]
            .error
            .as_deref()
            .unwrap()
            .contains("polyphony"));
        assert!(output.patterns[1].error.as_deref().unwrap().contains("2x2"));
    }

    #[test]
    fn test_broken_preset() {
        let dir = workspace();
        fs::write(dir.path().join("broken.json"), r#"{"max_polyphony": 2}"#).unwrap();
        let output = validate("broken", dir.path(), &[]);
        assert!(!output.ok);
        assert!(output.preset_error.unwrap().contains("DATASET_001"));

        let code = run("broken", dir.path(), &[], true).unwrap();
        assert_eq!(code, ExitCode::from(1));
    }
}
