//! Multi-instrument patterns: the instrument x timestep trigger grid.
//!
//! A pattern is created either from a JSON source (a recorded groove) or by
//! rejection sampling from a [`RandomPatternConfig`]. Recorded patterns are
//! usually sparse; [`Pattern::fill_empty_sequences_with_random`] augments them
//! by filling silent instruments under the same polyphony bounds.

use std::fmt;
use std::path::Path;

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{PolyphonyBounds, RandomPatternConfig};
use crate::error::{DatasetError, DatasetResult};
use crate::polyphony;
use crate::sequence::Sequence;

/// Instrument label to trigger list, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledTriggers(pub Vec<(String, Vec<u8>)>);

impl Serialize for LabeledTriggers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, triggers) in &self.0 {
            map.serialize_entry(label, triggers)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabeledTriggers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabeledTriggersVisitor;

        impl<'de> Visitor<'de> for LabeledTriggersVisitor {
            type Value = LabeledTriggers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of instrument labels to trigger lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, Vec<u8>)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, triggers)) = access.next_entry::<String, Vec<u8>>()? {
                    if entries.iter().any(|(existing, _)| *existing == label) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate instrument label '{}'",
                            label
                        )));
                    }
                    entries.push((label, triggers));
                }
                Ok(LabeledTriggers(entries))
            }
        }

        deserializer.deserialize_map(LabeledTriggersVisitor)
    }
}

/// On-disk layout of a recorded pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSource {
    pub triggers: LabeledTriggers,
}

/// Result of [`Pattern::fill_empty_sequences_with_random`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Augmentation {
    /// The input pattern already violated the polyphony bounds; nothing was
    /// touched.
    InvalidInput,
    /// Every empty sequence was filled.
    Completed {
        /// Instrument indices filled, in the order they were attempted.
        filled: Vec<usize>,
    },
    /// Filling `rolled_back` broke the bounds. That slot was restored and the
    /// pass stopped; later empty sequences were not attempted.
    Interrupted {
        filled: Vec<usize>,
        rolled_back: usize,
    },
}

impl Augmentation {
    /// True if at least one sequence was replaced.
    pub fn applied(&self) -> bool {
        !self.filled().is_empty()
    }

    pub fn filled(&self) -> &[usize] {
        match self {
            Augmentation::InvalidInput => &[],
            Augmentation::Completed { filled } | Augmentation::Interrupted { filled, .. } => {
                filled
            }
        }
    }
}

/// A full drum pattern: one sequence per instrument, all of equal length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sequence>", into = "Vec<Sequence>")]
pub struct Pattern {
    sequences: Vec<Sequence>,
}

impl TryFrom<Vec<Sequence>> for Pattern {
    type Error = DatasetError;

    fn try_from(sequences: Vec<Sequence>) -> DatasetResult<Self> {
        Pattern::new(sequences)
    }
}

impl From<Pattern> for Vec<Sequence> {
    fn from(pattern: Pattern) -> Self {
        pattern.sequences
    }
}

impl Pattern {
    /// Creates a pattern, requiring at least one sequence and a shared
    /// timestep count.
    pub fn new(sequences: Vec<Sequence>) -> DatasetResult<Self> {
        let Some(first) = sequences.first() else {
            return Err(DatasetError::config("pattern has no sequences"));
        };
        let timesteps = first.timestep_count();
        if let Some(other) = sequences
            .iter()
            .find(|s| s.timestep_count() != timesteps)
        {
            return Err(DatasetError::shape(format!(
                "sequence '{}' has {} timesteps, expected {}",
                other.label,
                other.timestep_count(),
                timesteps
            )));
        }
        Ok(Self { sequences })
    }

    /// Wraps each labeled trigger list as a single-cluster sequence, keeping
    /// the source's label order.
    pub fn from_source(source: PatternSource) -> DatasetResult<Self> {
        let sequences = source
            .triggers
            .0
            .into_iter()
            .map(|(label, triggers)| Sequence::from_triggers(label, triggers))
            .collect::<DatasetResult<Vec<_>>>()?;
        Self::new(sequences)
    }

    pub fn from_json_str(json: &str) -> DatasetResult<Self> {
        let source: PatternSource =
            serde_json::from_str(json).map_err(|e| DatasetError::config(e.to_string()))?;
        Self::from_source(source)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> DatasetResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Converts back to the source layout.
    pub fn to_source(&self) -> PatternSource {
        PatternSource {
            triggers: LabeledTriggers(
                self.sequences
                    .iter()
                    .map(|s| (s.label.clone(), s.triggers()))
                    .collect(),
            ),
        }
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn labels(&self) -> Vec<&str> {
        self.sequences.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn triggers(&self) -> Vec<Vec<u8>> {
        self.sequences.iter().map(Sequence::triggers).collect()
    }

    pub fn instrument_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn timestep_count(&self) -> usize {
        self.sequences
            .first()
            .map(Sequence::timestep_count)
            .unwrap_or(0)
    }

    /// Trigger grid of shape (instruments, timesteps).
    pub fn trigger_tensor(&self) -> Array2<f32> {
        let mut grid = Array2::zeros((self.instrument_count(), self.timestep_count()));
        for (mut row, sequence) in grid.rows_mut().into_iter().zip(&self.sequences) {
            row.assign(&sequence.tensor());
        }
        grid
    }

    /// Number of instruments triggered at each timestep.
    pub fn polyphony(&self) -> Array1<f32> {
        polyphony::polyphony(self.trigger_tensor().view())
    }

    pub fn valid_polyphony_requirements(&self, bounds: &PolyphonyBounds) -> bool {
        bounds.check(self.trigger_tensor().view())
    }

    /// Draws candidates until one satisfies the config's polyphony bounds.
    ///
    /// Fails with [`DatasetError::GenerationExhausted`] after
    /// `config.max_generation_attempts` rejected candidates.
    pub fn create_random<R: Rng + ?Sized>(
        config: &RandomPatternConfig,
        rng: &mut R,
    ) -> DatasetResult<Self> {
        Self::create_random_with_attempts(config, rng).map(|(pattern, _)| pattern)
    }

    /// Like [`Pattern::create_random`], also returning how many candidates were
    /// drawn.
    pub fn create_random_with_attempts<R: Rng + ?Sized>(
        config: &RandomPatternConfig,
        rng: &mut R,
    ) -> DatasetResult<(Self, usize)> {
        config.validate()?;

        for attempt in 1..=config.max_generation_attempts {
            let candidate = Self::random_candidate(config, rng)?;
            if candidate.valid_polyphony_requirements(&config.bounds) {
                return Ok((candidate, attempt));
            }
        }

        Err(DatasetError::GenerationExhausted {
            attempts: config.max_generation_attempts,
        })
    }

    fn random_candidate<R: Rng + ?Sized>(
        config: &RandomPatternConfig,
        rng: &mut R,
    ) -> DatasetResult<Self> {
        let sequences = config
            .random_sequence_configs
            .iter()
            .map(|sequence_config| Sequence::create_random(sequence_config, rng))
            .collect::<DatasetResult<Vec<_>>>()?;
        Self::new(sequences)
    }

    /// Replaces empty sequences with random ones drawn from the instrument's
    /// positional config, visiting empty instruments in random order.
    ///
    /// Replaced sequences keep the pattern's label. If the pattern is invalid
    /// to begin with nothing changes. The first replacement that breaks the
    /// bounds is undone and ends the pass.
    pub fn fill_empty_sequences_with_random<R: Rng + ?Sized>(
        &mut self,
        config: &RandomPatternConfig,
        rng: &mut R,
    ) -> DatasetResult<Augmentation> {
        if config.instrument_count() != self.instrument_count() {
            return Err(DatasetError::shape(format!(
                "config has {} instruments, pattern has {}",
                config.instrument_count(),
                self.instrument_count()
            )));
        }
        if config.timestep_count() != self.timestep_count() {
            return Err(DatasetError::shape(format!(
                "config produces {} timesteps, pattern has {}",
                config.timestep_count(),
                self.timestep_count()
            )));
        }

        if !self.valid_polyphony_requirements(&config.bounds) {
            return Ok(Augmentation::InvalidInput);
        }

        let mut order: Vec<usize> = (0..self.sequences.len())
            .filter(|&index| self.sequences[index].is_empty())
            .collect();
        order.shuffle(rng);

        let mut filled = Vec::with_capacity(order.len());
        for index in order {
            let mut replacement =
                Sequence::create_random(&config.random_sequence_configs[index], rng)?;
            replacement.label = self.sequences[index].label.clone();

            let previous = std::mem::replace(&mut self.sequences[index], replacement);
            if !self.valid_polyphony_requirements(&config.bounds) {
                self.sequences[index] = previous;
                return Ok(Augmentation::Interrupted {
                    filled,
                    rolled_back: index,
                });
            }
            filled.push(index);
        }

        Ok(Augmentation::Completed { filled })
    }
}
