//! Shared helpers for locating presets and writing outputs.

use anyhow::{Context, Result};
use colored::Colorize;
use dice_datasets::RandomPatternConfig;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default directory holding named presets.
pub const DEFAULT_PRESETS_DIR: &str = "presets";

/// Default root for generated datasets and models.
pub const DEFAULT_OUT_ROOT: &str = "dist";

/// Resolves `--preset` to a file.
///
/// A value that names an existing file or ends in `.json` is used as a path;
/// anything else is looked up as `<presets_dir>/<name>.json`.
pub fn resolve_preset(preset: &str, presets_dir: &Path) -> PathBuf {
    let as_path = Path::new(preset);
    if as_path.is_file() || preset.ends_with(".json") {
        as_path.to_path_buf()
    } else {
        presets_dir.join(format!("{}.json", preset))
    }
}

/// Loads and validates a generation preset.
pub fn load_preset(preset: &str, presets_dir: &Path) -> Result<(PathBuf, RandomPatternConfig)> {
    let path = resolve_preset(preset, presets_dir);
    let config = RandomPatternConfig::from_json_path(&path)
        .with_context(|| format!("Failed to load preset: {}", path.display()))?;
    Ok((path, config))
}

/// `<out_root>/<id>/`
pub fn dist_dir(out_root: &Path, id: &str) -> PathBuf {
    out_root.join(id)
}

/// `<out_root>/<id>/<id>.json`
pub fn dataset_path(out_root: &Path, id: &str) -> PathBuf {
    dist_dir(out_root, id).join(format!("{}.json", id))
}

/// `<out_root>/<id>/<id>-<architecture>-<loss>.model.json`
pub fn checkpoint_path(out_root: &Path, id: &str, architecture: &str, loss: &str) -> PathBuf {
    dist_dir(out_root, id).join(format!("{}-{}-{}.model.json", id, architecture, loss))
}

/// Creates the parent directory of `path` if needed.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Writes a pretty-printed JSON document.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    fs::write(path, json).with_context(|| format!("Failed to write: {}", path.display()))?;
    Ok(())
}

/// Prints a machine-readable summary to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    println!("{}", json);
    Ok(())
}

/// Prints a `label: value` line with a dimmed label.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).dimmed(), value);
}
