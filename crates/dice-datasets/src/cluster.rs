//! Clusters: the fixed-length trigger fragments sequences are assembled from.

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};

/// Ordered, fixed-length run of trigger values (0 or 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ClusterSource")]
pub struct Cluster {
    triggers: Vec<u8>,
}

/// Serialized form of a [`Cluster`], checked by [`Cluster::new`] on load.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClusterSource {
    triggers: Vec<u8>,
}

impl TryFrom<ClusterSource> for Cluster {
    type Error = DatasetError;

    fn try_from(source: ClusterSource) -> DatasetResult<Self> {
        Cluster::new(source.triggers)
    }
}

impl Cluster {
    /// Creates a cluster, rejecting trigger values other than 0 and 1.
    pub fn new(triggers: Vec<u8>) -> DatasetResult<Self> {
        if let Some(value) = triggers.iter().find(|&&t| t > 1) {
            return Err(DatasetError::config(format!(
                "trigger values must be 0 or 1, found {}",
                value
            )));
        }
        Ok(Self { triggers })
    }

    pub fn triggers(&self) -> &[u8] {
        &self.triggers
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// True when no trigger in the cluster is set.
    pub fn is_silent(&self) -> bool {
        self.triggers.iter().all(|&t| t == 0)
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A cluster together with its relative sampling weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeightedClusterSource")]
pub struct WeightedCluster {
    #[serde(flatten)]
    pub cluster: Cluster,
    pub weight: f64,
}

/// Preset form of a [`WeightedCluster`]. Unknown keys are rejected so a
/// misspelled `weight` never falls back to the default.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WeightedClusterSource {
    triggers: Vec<u8>,
    #[serde(default = "default_weight")]
    weight: f64,
}

impl TryFrom<WeightedClusterSource> for WeightedCluster {
    type Error = DatasetError;

    fn try_from(source: WeightedClusterSource) -> DatasetResult<Self> {
        WeightedCluster::new(source.triggers, source.weight)
    }
}

impl WeightedCluster {
    /// Creates a weighted cluster. Weights must be finite and non-negative.
    pub fn new(triggers: Vec<u8>, weight: f64) -> DatasetResult<Self> {
        let cluster = Cluster::new(triggers)?;
        let weighted = Self { cluster, weight };
        weighted.validate()?;
        Ok(weighted)
    }

    /// Re-checks invariants after deserialization.
    pub fn validate(&self) -> DatasetResult<()> {
        Cluster::new(self.cluster.triggers.clone())?;
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(DatasetError::config(format!(
                "cluster weight must be finite and >= 0, found {}",
                self.weight
            )));
        }
        Ok(())
    }

    pub fn triggers(&self) -> &[u8] {
        self.cluster.triggers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_binary_triggers() {
        let err = Cluster::new(vec![0, 2, 1]).unwrap_err();
        assert_eq!(err.code(), "DATASET_001");
    }

    #[test]
    fn test_silent_cluster() {
        assert!(Cluster::new(vec![0, 0, 0, 0]).unwrap().is_silent());
        assert!(!Cluster::new(vec![0, 1, 0, 0]).unwrap().is_silent());
    }

    #[test]
    fn test_weight_defaults_to_one() {
        let cluster: WeightedCluster = serde_json::from_str(r#"{"triggers": [1, 0]}"#).unwrap();
        assert_eq!(cluster.weight, 1.0);
        assert_eq!(cluster.triggers(), &[1, 0]);
    }

    #[test]
    fn test_deserialize_rejects_non_binary_triggers() {
        assert!(serde_json::from_str::<Cluster>(r#"{"triggers": [0, 9]}"#).is_err());
        assert!(serde_json::from_str::<WeightedCluster>(r#"{"triggers": [3, 0]}"#).is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys() {
        assert!(
            serde_json::from_str::<WeightedCluster>(r#"{"triggers": [1, 0], "wieght": 0}"#)
                .is_err()
        );
        assert!(serde_json::from_str::<WeightedCluster>(r#"{"triggers": [1, 0], "weight": -1}"#)
            .is_err());
    }

    #[test]
    fn test_weighted_cluster_serializes_flat() {
        let cluster = WeightedCluster::new(vec![1, 0], 0.5).unwrap();
        let json = serde_json::to_string(&cluster).unwrap();
        assert_eq!(json, r#"{"triggers":[1,0],"weight":0.5}"#);
        assert_eq!(serde_json::from_str::<WeightedCluster>(&json).unwrap(), cluster);
    }

    #[test]
    fn test_rejects_negative_weight() {
        assert!(WeightedCluster::new(vec![1, 0], -0.5).is_err());
        assert!(WeightedCluster::new(vec![1, 0], f64::NAN).is_err());
        assert!(WeightedCluster::new(vec![1, 0], 0.0).is_ok());
    }
}
