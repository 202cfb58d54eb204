//! Random generation configs.
//!
//! Configs are loaded once from JSON presets and treated as read-only. The
//! on-disk format lists `random_sequence_configs` top instrument first for
//! readability; the loader reverses that list so that config index `i` lines up
//! with `Pattern::sequences()[i]`.
//!
//! ```json
//! {
//!   "max_polyphony": 3,
//!   "max_num_events_with_full_polyphony": 4,
//!   "random_sequence_configs": [
//!     {
//!       "label": "HH",
//!       "length_in_clusters": 4,
//!       "weighted_clusters": [{ "triggers": [1, 0, 1, 0], "weight": 3 }]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::cluster::WeightedCluster;
use crate::error::{DatasetError, DatasetResult};
use crate::polyphony::valid_polyphony_requirements;

/// Default cap on rejection-sampling attempts in `Pattern::create_random`.
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: usize = 10_000;

/// Generation parameters for one instrument's sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSequenceConfig {
    /// Instrument label the generated sequence carries.
    pub label: String,
    /// Candidate clusters with their sampling weights.
    pub weighted_clusters: Vec<WeightedCluster>,
    /// Number of clusters concatenated into one sequence.
    pub length_in_clusters: usize,
}

impl RandomSequenceConfig {
    /// Creates a validated sequence config.
    pub fn new(
        label: impl Into<String>,
        weighted_clusters: Vec<WeightedCluster>,
        length_in_clusters: usize,
    ) -> DatasetResult<Self> {
        let config = Self {
            label: label.into(),
            weighted_clusters,
            length_in_clusters,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the config can produce sequences of a single well-defined
    /// length.
    pub fn validate(&self) -> DatasetResult<()> {
        if self.weighted_clusters.is_empty() {
            return Err(DatasetError::config(format!(
                "sequence config '{}' has no weighted clusters",
                self.label
            )));
        }
        if self.length_in_clusters == 0 {
            return Err(DatasetError::config(format!(
                "sequence config '{}' must have a positive length_in_clusters",
                self.label
            )));
        }
        for cluster in &self.weighted_clusters {
            cluster.validate()?;
        }

        let cluster_length = self.weighted_clusters[0].triggers().len();
        if cluster_length == 0 {
            return Err(DatasetError::config(format!(
                "sequence config '{}' has clusters without triggers",
                self.label
            )));
        }
        if let Some(other) = self
            .weighted_clusters
            .iter()
            .find(|c| c.triggers().len() != cluster_length)
        {
            return Err(DatasetError::shape(format!(
                "sequence config '{}' mixes cluster lengths {} and {}",
                self.label,
                cluster_length,
                other.triggers().len()
            )));
        }
        Ok(())
    }

    /// Length shared by every cluster of this config.
    pub fn cluster_length(&self) -> usize {
        self.weighted_clusters
            .first()
            .map(|c| c.triggers().len())
            .unwrap_or(0)
    }

    /// Number of timesteps in a sequence generated from this config.
    pub fn sequence_length(&self) -> usize {
        self.length_in_clusters * self.cluster_length()
    }
}

/// Upper bounds on simultaneous triggers in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyphonyBounds {
    /// Maximum number of instruments triggered at the same timestep.
    pub max_polyphony: usize,
    /// Maximum number of timesteps allowed to sit exactly at `max_polyphony`.
    pub max_num_events_with_full_polyphony: usize,
}

impl PolyphonyBounds {
    pub fn new(max_polyphony: usize, max_num_events_with_full_polyphony: usize) -> Self {
        Self {
            max_polyphony,
            max_num_events_with_full_polyphony,
        }
    }

    /// Evaluates the polyphony oracle on an instrument x timestep grid.
    pub fn check(&self, grid: ArrayView2<'_, f32>) -> bool {
        valid_polyphony_requirements(
            grid,
            self.max_polyphony,
            self.max_num_events_with_full_polyphony,
        )
    }
}

/// On-disk layout of a pattern config preset.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternConfigSource {
    random_sequence_configs: Vec<RandomSequenceConfig>,
    max_polyphony: usize,
    max_num_events_with_full_polyphony: usize,
    #[serde(default)]
    max_generation_attempts: Option<usize>,
}

/// Generation parameters for a full multi-instrument pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomPatternConfig {
    /// One config per instrument, aligned with `Pattern::sequences()`.
    pub random_sequence_configs: Vec<RandomSequenceConfig>,
    pub bounds: PolyphonyBounds,
    /// Cap on candidates drawn by rejection sampling.
    pub max_generation_attempts: usize,
}

impl RandomPatternConfig {
    /// Creates a validated config. `random_sequence_configs` is taken in
    /// pattern order (no reversal).
    pub fn new(
        random_sequence_configs: Vec<RandomSequenceConfig>,
        max_polyphony: usize,
        max_num_events_with_full_polyphony: usize,
    ) -> DatasetResult<Self> {
        let config = Self {
            random_sequence_configs,
            bounds: PolyphonyBounds::new(max_polyphony, max_num_events_with_full_polyphony),
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
        };
        config.validate()?;
        Ok(config)
    }

    /// Overrides the rejection-sampling attempt cap.
    pub fn with_max_generation_attempts(mut self, attempts: usize) -> DatasetResult<Self> {
        self.max_generation_attempts = attempts;
        self.validate()?;
        Ok(self)
    }

    /// Parses a preset document, reversing the listed sequence configs.
    pub fn from_json_str(json: &str) -> DatasetResult<Self> {
        let source: PatternConfigSource =
            serde_json::from_str(json).map_err(|e| DatasetError::config(e.to_string()))?;

        let mut random_sequence_configs = source.random_sequence_configs;
        random_sequence_configs.reverse();

        let config = Self {
            random_sequence_configs,
            bounds: PolyphonyBounds::new(
                source.max_polyphony,
                source.max_num_events_with_full_polyphony,
            ),
            max_generation_attempts: source
                .max_generation_attempts
                .unwrap_or(DEFAULT_MAX_GENERATION_ATTEMPTS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads a preset from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> DatasetResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if self.random_sequence_configs.is_empty() {
            return Err(DatasetError::config(
                "random_sequence_configs must not be empty",
            ));
        }
        if self.bounds.max_polyphony == 0 {
            return Err(DatasetError::config("max_polyphony must be positive"));
        }
        if self.max_generation_attempts == 0 {
            return Err(DatasetError::config(
                "max_generation_attempts must be positive",
            ));
        }
        for config in &self.random_sequence_configs {
            config.validate()?;
        }

        let timesteps = self.random_sequence_configs[0].sequence_length();
        if let Some(other) = self
            .random_sequence_configs
            .iter()
            .find(|c| c.sequence_length() != timesteps)
        {
            return Err(DatasetError::shape(format!(
                "sequence config '{}' produces {} timesteps, expected {}",
                other.label,
                other.sequence_length(),
                timesteps
            )));
        }
        Ok(())
    }

    pub fn instrument_count(&self) -> usize {
        self.random_sequence_configs.len()
    }

    pub fn timestep_count(&self) -> usize {
        self.random_sequence_configs
            .first()
            .map(RandomSequenceConfig::sequence_length)
            .unwrap_or(0)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.random_sequence_configs
            .iter()
            .map(|c| c.label.as_str())
            .collect()
    }
}
