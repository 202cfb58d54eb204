//! DICE Drum Pattern Datasets
//!
//! This crate generates, augments, and validates symbolic drum patterns used
//! to train DICE reconstruction models.
//!
//! # Overview
//!
//! - A [`Cluster`] is a fixed-length run of triggers; a [`WeightedCluster`]
//!   adds a sampling weight.
//! - A [`Sequence`] is one instrument's timeline, built by concatenating
//!   clusters drawn from a [`RandomSequenceConfig`].
//! - A [`Pattern`] stacks one sequence per instrument into an
//!   instrument x timestep grid.
//! - [`valid_polyphony_requirements`] is the validity oracle shared by
//!   generation, augmentation, and the training losses.
//!
//! # Example
//!
//! ```
//! use dice_datasets::{create_rng, Pattern, RandomPatternConfig};
//!
//! let config = RandomPatternConfig::from_json_str(r#"{
//!     "max_polyphony": 2,
//!     "max_num_events_with_full_polyphony": 4,
//!     "random_sequence_configs": [
//!         {"label": "HH", "length_in_clusters": 4,
//!          "weighted_clusters": [{"triggers": [1, 0, 1, 0]}, {"triggers": [0, 0, 0, 0]}]},
//!         {"label": "BD", "length_in_clusters": 4,
//!          "weighted_clusters": [{"triggers": [1, 0, 0, 0], "weight": 3}]}
//!     ]
//! }"#).unwrap();
//!
//! let mut rng = create_rng(42);
//! let pattern = Pattern::create_random(&config, &mut rng).unwrap();
//! assert_eq!(pattern.labels(), vec!["BD", "HH"]);
//! assert!(pattern.valid_polyphony_requirements(&config.bounds));
//! ```
//!
//! # Modules
//!
//! - [`cluster`]: cluster types
//! - [`sequence`]: weighted random sequence construction
//! - [`config`]: generation presets and polyphony bounds
//! - [`pattern`]: patterns, rejection sampling, and augmentation
//! - [`polyphony`]: the validity oracle
//! - [`dataset`]: indexable pattern collections
//! - [`assembly`]: parallel bulk dataset assembly
//! - [`device`]: explicit compute placement
//! - [`rng`]: seeded PCG32 streams

pub mod assembly;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod device;
pub mod error;
pub mod pattern;
pub mod polyphony;
pub mod rng;
pub mod sequence;

pub use assembly::{AssemblyOptions, AssemblyReport, DatasetAssembly};
pub use cluster::{Cluster, WeightedCluster};
pub use config::{
    PolyphonyBounds, RandomPatternConfig, RandomSequenceConfig, DEFAULT_MAX_GENERATION_ATTEMPTS,
};
pub use dataset::{DatasetSplit, PatternDataset, Subset, DEFAULT_SPLIT_RATIOS};
pub use device::Device;
pub use error::{DatasetError, DatasetResult};
pub use pattern::{Augmentation, LabeledTriggers, Pattern, PatternSource};
pub use polyphony::{polyphony, valid_polyphony_requirements};
pub use rng::{create_rng, create_task_rng, derive_task_seed};
pub use sequence::Sequence;
