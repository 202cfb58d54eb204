//! Reconstruction losses with a polyphony-validity penalty.
//!
//! Both losses evaluate the polyphony oracle on the *target* and scale the
//! loss by `penalty_factor` where the target is invalid. Because the check
//! looks at the ground truth and not at the reconstruction, the penalty acts
//! as a fixed per-sample weight on invalid training targets.
//!
//! Each (batch, channel) grid of the target gets its own verdict, and both
//! variants weight the elementwise distance of an invalid grid before taking
//! the mean. For a single-sample batch this equals scaling the reduced loss.

use std::fmt;
use std::str::FromStr;

use dice_datasets::PolyphonyBounds;
use ndarray::{Array4, ArrayView4, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::tensor::{ensure_same_shape, sample_grids};

/// Penalty multiplier applied to invalid targets unless overridden.
pub const DEFAULT_PENALTY_FACTOR: f32 = 10.0;

/// Loss function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiceLoss {
    #[serde(rename = "mse_poly_penalty")]
    MsePolyphonyPenalty,
    #[serde(rename = "l1_poly_penalty")]
    L1PolyphonyPenalty,
}

impl DiceLoss {
    pub const ALL: [DiceLoss; 2] = [DiceLoss::MsePolyphonyPenalty, DiceLoss::L1PolyphonyPenalty];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiceLoss::MsePolyphonyPenalty => "mse_poly_penalty",
            DiceLoss::L1PolyphonyPenalty => "l1_poly_penalty",
        }
    }
}

impl fmt::Display for DiceLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiceLoss {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        DiceLoss::ALL
            .into_iter()
            .find(|loss| loss.as_str() == s)
            .ok_or_else(|| ModelError::UnknownLoss(s.to_string()))
    }
}

/// Scalar loss plus its gradient with respect to the input.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOutput {
    pub value: f32,
    pub gradient: Array4<f32>,
    /// Number of target grids that failed the polyphony oracle.
    pub penalized_samples: usize,
}

/// A reconstruction loss over (batch, channel, instruments, timesteps) tensors.
pub trait LossFunction: Send + Sync {
    fn kind(&self) -> DiceLoss;

    fn bounds(&self) -> PolyphonyBounds;

    /// Computes the loss with an explicit penalty factor.
    fn compute(
        &self,
        input: ArrayView4<'_, f32>,
        target: ArrayView4<'_, f32>,
        penalty_factor: f32,
    ) -> ModelResult<LossOutput>;

    /// Computes the loss with [`DEFAULT_PENALTY_FACTOR`].
    fn forward(
        &self,
        input: ArrayView4<'_, f32>,
        target: ArrayView4<'_, f32>,
    ) -> ModelResult<LossOutput> {
        self.compute(input, target, DEFAULT_PENALTY_FACTOR)
    }
}

/// Builds the loss selected by `kind`.
pub fn create_loss(kind: DiceLoss, bounds: PolyphonyBounds) -> Box<dyn LossFunction> {
    match kind {
        DiceLoss::MsePolyphonyPenalty => Box::new(MseLossWithPolyphonyPenalty::new(bounds)),
        DiceLoss::L1PolyphonyPenalty => Box::new(L1LossWithPolyphonyPenalty::new(bounds)),
    }
}

/// Oracle verdict for every (instruments, timesteps) grid of `target`.
fn target_validity(target: ArrayView4<'_, f32>, bounds: &PolyphonyBounds) -> Vec<bool> {
    sample_grids(target)
        .into_iter()
        .map(|grid| bounds.check(grid))
        .collect()
}

/// Elementwise weights: `penalty_factor` on invalid target grids, 1 elsewhere.
/// Also returns the number of penalized grids.
fn penalty_weights(
    target: ArrayView4<'_, f32>,
    bounds: &PolyphonyBounds,
    penalty_factor: f32,
) -> (Array4<f32>, usize) {
    let (_, channels, _, _) = target.dim();
    let mut weights = Array4::<f32>::ones(target.raw_dim());
    let mut penalized = 0;
    for (index, valid) in target_validity(target, bounds).into_iter().enumerate() {
        if !valid {
            penalized += 1;
            weights
                .index_axis_mut(Axis(0), index / channels)
                .index_axis_mut(Axis(0), index % channels)
                .fill(penalty_factor);
        }
    }
    (weights, penalized)
}

/// Mean squared error, penalised elementwise per invalid target sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MseLossWithPolyphonyPenalty {
    bounds: PolyphonyBounds,
}

impl MseLossWithPolyphonyPenalty {
    pub fn new(bounds: PolyphonyBounds) -> Self {
        Self { bounds }
    }
}

impl LossFunction for MseLossWithPolyphonyPenalty {
    fn kind(&self) -> DiceLoss {
        DiceLoss::MsePolyphonyPenalty
    }

    fn bounds(&self) -> PolyphonyBounds {
        self.bounds
    }

    fn compute(
        &self,
        input: ArrayView4<'_, f32>,
        target: ArrayView4<'_, f32>,
        penalty_factor: f32,
    ) -> ModelResult<LossOutput> {
        ensure_same_shape(target.shape(), input.shape())?;
        let count = input.len().max(1) as f32;
        let (weights, penalized_samples) = penalty_weights(target, &self.bounds, penalty_factor);

        let mut value = 0.0f32;
        let mut gradient = Array4::<f32>::zeros(target.raw_dim());
        Zip::from(&mut gradient)
            .and(&input)
            .and(&target)
            .and(&weights)
            .for_each(|g, &x, &y, &w| {
                let diff = x - y;
                value += w * diff * diff;
                *g = 2.0 * w * diff / count;
            });

        Ok(LossOutput {
            value: value / count,
            gradient,
            penalized_samples,
        })
    }
}

/// Mean absolute error, penalised elementwise per invalid target sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1LossWithPolyphonyPenalty {
    bounds: PolyphonyBounds,
}

impl L1LossWithPolyphonyPenalty {
    pub fn new(bounds: PolyphonyBounds) -> Self {
        Self { bounds }
    }
}

impl LossFunction for L1LossWithPolyphonyPenalty {
    fn kind(&self) -> DiceLoss {
        DiceLoss::L1PolyphonyPenalty
    }

    fn bounds(&self) -> PolyphonyBounds {
        self.bounds
    }

    fn compute(
        &self,
        input: ArrayView4<'_, f32>,
        target: ArrayView4<'_, f32>,
        penalty_factor: f32,
    ) -> ModelResult<LossOutput> {
        ensure_same_shape(target.shape(), input.shape())?;
        let count = input.len().max(1) as f32;

        let (weights, penalized_samples) = penalty_weights(target, &self.bounds, penalty_factor);

        let mut total = 0.0f32;
        let mut gradient = Array4::<f32>::zeros(target.raw_dim());
        Zip::from(&mut gradient)
            .and(&input)
            .and(&target)
            .and(&weights)
            .for_each(|g, &x, &y, &w| {
                let diff = x - y;
                total += w * diff.abs();
                *g = if diff > 0.0 {
                    w / count
                } else if diff < 0.0 {
                    -w / count
                } else {
                    0.0
                };
            });

        Ok(LossOutput {
            value: total / count,
            gradient,
            penalized_samples,
        })
    }
}
