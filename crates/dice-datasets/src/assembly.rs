//! Bulk dataset assembly from recorded patterns and random generation.
//!
//! Each recorded pattern contributes one untouched copy plus
//! `augmentation_factor` augmented copies; `random_count` purely random
//! patterns are appended after those. Every task owns its pattern and its own
//! PCG32 stream derived from `seed` and the task index, so the result is the
//! same whatever the device's thread count.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::RandomPatternConfig;
use crate::dataset::PatternDataset;
use crate::device::Device;
use crate::error::{DatasetError, DatasetResult};
use crate::pattern::{Augmentation, Pattern};
use crate::rng::create_task_rng;

/// Knobs for [`DatasetAssembly`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyOptions {
    /// Augmented copies produced per recorded pattern.
    pub augmentation_factor: usize,
    /// Purely random patterns appended to the dataset.
    pub random_count: usize,
    /// Base seed for all task streams.
    pub seed: u32,
    pub device: Device,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            augmentation_factor: 0,
            random_count: 0,
            seed: 0,
            device: Device::Cpu,
        }
    }
}

/// Tally of what an assembly run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// Recorded patterns read.
    pub sources: usize,
    /// Untouched copies of recorded patterns.
    pub loaded: usize,
    /// Augmentation tasks that replaced at least one sequence.
    pub augmented: usize,
    /// Augmentation tasks that left the pattern as it was.
    pub unchanged: usize,
    /// Augmentation tasks whose source already broke the polyphony bounds.
    pub invalid_sources: usize,
    /// Augmentation passes that stopped on a rolled-back replacement.
    pub interrupted: usize,
    /// Purely random patterns.
    pub generated: usize,
    /// Candidates drawn by rejection sampling across all generation tasks.
    pub generation_attempts: usize,
}

impl AssemblyReport {
    pub fn total(&self) -> usize {
        self.loaded + self.augmented + self.unchanged + self.generated
    }
}

#[derive(Debug, Clone, Copy)]
enum Task<'a> {
    Load(&'a Pattern),
    Augment(&'a Pattern),
    Generate,
}

#[derive(Debug)]
enum TaskOutput {
    Loaded(Pattern),
    Augmented(Pattern, Augmentation),
    Generated(Pattern, usize),
}

/// Builds a [`PatternDataset`] from a generation config and options.
#[derive(Debug, Clone)]
pub struct DatasetAssembly {
    config: RandomPatternConfig,
    options: AssemblyOptions,
}

impl DatasetAssembly {
    pub fn new(config: RandomPatternConfig, options: AssemblyOptions) -> Self {
        Self { config, options }
    }

    pub fn config(&self) -> &RandomPatternConfig {
        &self.config
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Loads every `*.json` pattern directly inside `folder` (sorted by file
    /// name) and assembles the dataset from them.
    pub fn from_folder(
        &self,
        folder: impl AsRef<Path>,
    ) -> DatasetResult<(PatternDataset, AssemblyReport)> {
        let files = pattern_files(folder.as_ref())?;
        let pool = self.options.device.thread_pool()?;
        let sources = pool.install(|| {
            files
                .par_iter()
                .map(|path| load_pattern(path))
                .collect::<DatasetResult<Vec<_>>>()
        })?;
        self.assemble(&sources)
    }

    /// Assembles the dataset from already-loaded recorded patterns.
    pub fn assemble(&self, sources: &[Pattern]) -> DatasetResult<(PatternDataset, AssemblyReport)> {
        self.config.validate()?;

        let mut tasks = Vec::with_capacity(
            sources.len() * (1 + self.options.augmentation_factor) + self.options.random_count,
        );
        for source in sources {
            tasks.push(Task::Load(source));
            tasks.extend(std::iter::repeat(Task::Augment(source)).take(self.options.augmentation_factor));
        }
        tasks.extend(std::iter::repeat(Task::Generate).take(self.options.random_count));

        let pool = self.options.device.thread_pool()?;
        let outputs = pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .map(|(index, task)| self.run_task(index as u64, *task))
                .collect::<DatasetResult<Vec<_>>>()
        })?;

        let mut report = AssemblyReport {
            sources: sources.len(),
            ..AssemblyReport::default()
        };
        let patterns = outputs
            .into_iter()
            .map(|output| match output {
                TaskOutput::Loaded(pattern) => {
                    report.loaded += 1;
                    pattern
                }
                TaskOutput::Augmented(pattern, outcome) => {
                    if outcome.applied() {
                        report.augmented += 1;
                    } else {
                        report.unchanged += 1;
                    }
                    match outcome {
                        Augmentation::InvalidInput => report.invalid_sources += 1,
                        Augmentation::Interrupted { .. } => report.interrupted += 1,
                        Augmentation::Completed { .. } => {}
                    }
                    pattern
                }
                TaskOutput::Generated(pattern, attempts) => {
                    report.generated += 1;
                    report.generation_attempts += attempts;
                    pattern
                }
            })
            .collect();

        Ok((PatternDataset::new(patterns), report))
    }

    fn run_task(&self, index: u64, task: Task<'_>) -> DatasetResult<TaskOutput> {
        match task {
            Task::Load(source) => Ok(TaskOutput::Loaded(source.clone())),
            Task::Augment(source) => {
                let mut rng = create_task_rng(self.options.seed, index);
                let mut pattern = source.clone();
                let outcome = pattern.fill_empty_sequences_with_random(&self.config, &mut rng)?;
                Ok(TaskOutput::Augmented(pattern, outcome))
            }
            Task::Generate => {
                let mut rng = create_task_rng(self.options.seed, index);
                let (pattern, attempts) =
                    Pattern::create_random_with_attempts(&self.config, &mut rng)?;
                Ok(TaskOutput::Generated(pattern, attempts))
            }
        }
    }
}

/// `*.json` files directly inside `folder`, sorted by file name.
pub fn pattern_files(folder: &Path) -> DatasetResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn load_pattern(path: &Path) -> DatasetResult<Pattern> {
    Pattern::from_json_path(path).map_err(|e| match e {
        DatasetError::Config { message } => {
            DatasetError::config(format!("{}: {}", path.display(), message))
        }
        DatasetError::Shape { message } => {
            DatasetError::shape(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::WeightedCluster;
    use crate::config::RandomSequenceConfig;
    use pretty_assertions::assert_eq;

    fn config() -> RandomPatternConfig {
        let sparse = RandomSequenceConfig::new(
            "any",
            vec![
                WeightedCluster::new(vec![1, 0, 0, 0], 1.0).unwrap(),
                WeightedCluster::new(vec![0, 0, 0, 0], 3.0).unwrap(),
            ],
            2,
        )
        .unwrap();
        RandomPatternConfig::new(vec![sparse; 3], 2, 2).unwrap()
    }

    fn source() -> Pattern {
        Pattern::from_json_str(
            r#"{"triggers": {"BD": [1,0,0,0,1,0,0,0], "SD": [0,0,1,0,0,0,1,0], "HH": [0,0,0,0,0,0,0,0]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_task_counts() {
        let options = AssemblyOptions {
            augmentation_factor: 3,
            random_count: 4,
            seed: 9,
            device: Device::Cpu,
        };
        let (dataset, report) = DatasetAssembly::new(config(), options)
            .assemble(&[source(), source()])
            .unwrap();

        assert_eq!(dataset.len(), 2 * (1 + 3) + 4);
        assert_eq!(report.sources, 2);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.augmented + report.unchanged, 6);
        assert_eq!(report.generated, 4);
        assert!(report.generation_attempts >= 4);
        assert_eq!(report.total(), dataset.len());
        assert_eq!(dataset.pattern(0).unwrap(), &source());
    }

    #[test]
    fn test_output_independent_of_thread_count() {
        let run = |device| {
            let options = AssemblyOptions {
                augmentation_factor: 4,
                random_count: 6,
                seed: 21,
                device,
            };
            DatasetAssembly::new(config(), options)
                .assemble(&[source()])
                .unwrap()
        };

        let (single, single_report) = run(Device::Cpu);
        let (parallel, parallel_report) = run(Device::CpuParallel { threads: 4 });
        assert_eq!(single, parallel);
        assert_eq!(single_report, parallel_report);
    }

    #[test]
    fn test_every_output_meets_requirements() {
        let options = AssemblyOptions {
            augmentation_factor: 5,
            random_count: 5,
            seed: 3,
            device: Device::CpuParallel { threads: 2 },
        };
        let config = config();
        let (dataset, _) = DatasetAssembly::new(config.clone(), options)
            .assemble(&[source()])
            .unwrap();
        for pattern in dataset.patterns() {
            assert!(pattern.valid_polyphony_requirements(&config.bounds));
        }
    }

    #[test]
    fn test_from_folder_reads_sorted_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"triggers": {"BD": [0,0,0,0,0,0,0,0], "SD": [0,0,0,0,0,0,0,0], "HH": [1,0,0,0,0,0,0,0]}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            serde_json::to_string(&source().to_source()).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (dataset, report) = DatasetAssembly::new(config(), AssemblyOptions::default())
            .from_folder(dir.path())
            .unwrap();

        assert_eq!(report.sources, 2);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.pattern(0).unwrap(), &source());
    }

    #[test]
    fn test_from_folder_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), r#"{"triggers": 3}"#).unwrap();

        let err = DatasetAssembly::new(config(), AssemblyOptions::default())
            .from_folder(dir.path())
            .unwrap_err();
        assert_eq!(err.code(), "DATASET_001");
        assert!(err.to_string().contains("broken.json"));
    }
}
