//! Indexable, read-only pattern collections.

use std::path::Path;

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};
use crate::pattern::Pattern;

/// Default train / validation / test proportions.
pub const DEFAULT_SPLIT_RATIOS: [f64; 3] = [0.75, 0.1, 0.15];

/// An ordered collection of patterns, immutable after construction.
///
/// Index `i` maps to the trigger tensor of the `i`-th pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternDataset {
    patterns: Vec<Pattern>,
}

impl PatternDataset {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Trigger tensor of pattern `idx`, shape (instruments, timesteps).
    pub fn get(&self, idx: usize) -> Option<Array2<f32>> {
        self.patterns.get(idx).map(Pattern::trigger_tensor)
    }

    pub fn pattern(&self, idx: usize) -> Option<&Pattern> {
        self.patterns.get(idx)
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn iter(&self) -> impl Iterator<Item = Array2<f32>> + '_ {
        self.patterns.iter().map(Pattern::trigger_tensor)
    }

    /// Grid shape shared by every pattern, or `None` for an empty dataset.
    ///
    /// Fails when patterns disagree on shape.
    pub fn grid_shape(&self) -> DatasetResult<Option<(usize, usize)>> {
        let mut shapes = self
            .patterns
            .iter()
            .map(|p| (p.instrument_count(), p.timestep_count()));
        let Some(first) = shapes.next() else {
            return Ok(None);
        };
        if let Some(other) = shapes.find(|&shape| shape != first) {
            return Err(DatasetError::shape(format!(
                "dataset mixes pattern shapes {:?} and {:?}",
                first, other
            )));
        }
        Ok(Some(first))
    }

    /// Randomly partitions indices into train / validation / test subsets.
    ///
    /// Train and validation sizes are `floor(ratio * len)`; test takes the
    /// remainder.
    pub fn random_split<R: Rng + ?Sized>(
        &self,
        ratios: [f64; 3],
        rng: &mut R,
    ) -> DatasetResult<DatasetSplit<'_>> {
        if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) || ratios[0] + ratios[1] > 1.0 {
            return Err(DatasetError::config(format!(
                "invalid split ratios {:?}",
                ratios
            )));
        }

        let len = self.len();
        let train_size = (ratios[0] * len as f64).floor() as usize;
        let validation_size = (ratios[1] * len as f64).floor() as usize;

        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(rng);

        let test = indices.split_off(train_size + validation_size);
        let validation = indices.split_off(train_size);

        Ok(DatasetSplit {
            train: Subset::new(self, indices),
            validation: Subset::new(self, validation),
            test: Subset::new(self, test),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> DatasetResult<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> DatasetResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let dataset: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        dataset.grid_shape()?;
        Ok(dataset)
    }
}

impl FromIterator<Pattern> for PatternDataset {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A view over selected dataset indices.
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    dataset: &'a PatternDataset,
    indices: Vec<usize>,
}

impl<'a> Subset<'a> {
    pub fn new(dataset: &'a PatternDataset, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Tensor at position `idx` of the subset.
    pub fn get(&self, idx: usize) -> Option<Array2<f32>> {
        self.indices.get(idx).and_then(|&i| self.dataset.get(i))
    }

    pub fn dataset(&self) -> &'a PatternDataset {
        self.dataset
    }
}

/// Train / validation / test partition from [`PatternDataset::random_split`].
#[derive(Debug, Clone)]
pub struct DatasetSplit<'a> {
    pub train: Subset<'a>,
    pub validation: Subset<'a>,
    pub test: Subset<'a>,
}
