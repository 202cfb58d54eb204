//! Single-instrument sequences built from concatenated clusters.

use ndarray::Array1;
use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::config::RandomSequenceConfig;
use crate::error::{DatasetError, DatasetResult};

/// One instrument's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub label: String,
    pub clusters: Vec<Cluster>,
}

impl Sequence {
    pub fn new(label: impl Into<String>, clusters: Vec<Cluster>) -> Self {
        Self {
            label: label.into(),
            clusters,
        }
    }

    /// Wraps a flat trigger list as a single-cluster sequence.
    pub fn from_triggers(label: impl Into<String>, triggers: Vec<u8>) -> DatasetResult<Self> {
        Ok(Self::new(label, vec![Cluster::new(triggers)?]))
    }

    /// Draws `length_in_clusters` clusters independently, with replacement,
    /// with probability proportional to their weights.
    ///
    /// Zero-weight clusters are never drawn while any weight is positive. When
    /// every weight is zero the draw falls back to uniform.
    pub fn create_random<R: Rng + ?Sized>(
        config: &RandomSequenceConfig,
        rng: &mut R,
    ) -> DatasetResult<Self> {
        config.validate()?;

        let candidates = &config.weighted_clusters;
        let weights = candidates.iter().map(|c| c.weight);
        let clusters = match WeightedIndex::<f64>::new(weights) {
            Ok(dist) => (0..config.length_in_clusters)
                .map(|_| candidates[dist.sample(rng)].cluster.clone())
                .collect(),
            Err(WeightedError::AllWeightsZero) => (0..config.length_in_clusters)
                .map(|_| candidates[rng.gen_range(0..candidates.len())].cluster.clone())
                .collect(),
            Err(e) => {
                return Err(DatasetError::config(format!(
                    "sequence config '{}': {}",
                    config.label, e
                )))
            }
        };

        Ok(Self::new(config.label.clone(), clusters))
    }

    /// Concatenated triggers of every cluster, in order.
    pub fn triggers(&self) -> Vec<u8> {
        self.clusters
            .iter()
            .flat_map(|c| c.triggers().iter().copied())
            .collect()
    }

    pub fn timestep_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }

    /// An empty sequence is one where the instrument never sounds.
    pub fn is_empty(&self) -> bool {
        self.clusters.iter().all(Cluster::is_silent)
    }

    /// Triggers as a 1D float tensor.
    pub fn tensor(&self) -> Array1<f32> {
        self.clusters
            .iter()
            .flat_map(|c| c.triggers().iter().map(|&t| f32::from(t)))
            .collect()
    }
}
