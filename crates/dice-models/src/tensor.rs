//! Tensor plumbing between datasets and models.
//!
//! Models consume and produce tensors of shape
//! (batch, channel, instruments, timesteps) with a single channel. Losses and
//! validity checks work on the (instruments, timesteps) slice of each sample.

use dice_datasets::Subset;
use ndarray::{Array3, Array4, ArrayView2, ArrayView4, Axis};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{ModelError, ModelResult};

/// Stacks the subset entries at `positions` into a (batch, instruments,
/// timesteps) tensor.
pub fn stack_batch(subset: &Subset<'_>, positions: &[usize]) -> ModelResult<Array3<f32>> {
    let grids = positions
        .iter()
        .map(|&p| {
            subset.get(p).ok_or_else(|| {
                ModelError::invalid_param("batch", format!("position {} is out of range", p))
            })
        })
        .collect::<ModelResult<Vec<_>>>()?;

    let views: Vec<ArrayView2<'_, f32>> = grids.iter().map(|g| g.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|_| {
        let expected = grids.first().map(|g| g.shape().to_vec()).unwrap_or_default();
        let found = grids
            .iter()
            .map(|g| g.shape().to_vec())
            .find(|s| *s != expected)
            .unwrap_or_default();
        ModelError::shape(&expected, &found)
    })
}

/// Inserts the singleton channel axis: (B, I, T) -> (B, 1, I, T).
pub fn add_channel_dimension(batch: Array3<f32>) -> Array4<f32> {
    batch.insert_axis(Axis(1))
}

/// Adds standard normal noise scaled by `noise_level`.
pub fn add_noise<R: Rng + ?Sized>(tensor: &Array4<f32>, noise_level: f32, rng: &mut R) -> Array4<f32> {
    tensor.mapv(|v| {
        let noise: f32 = StandardNormal.sample(rng);
        v + noise * noise_level
    })
}

/// Maps values `>= threshold` to 1 and the rest to 0.
pub fn threshold(tensor: ArrayView4<'_, f32>, threshold: f32) -> Array4<f32> {
    tensor.mapv(|v| if v >= threshold { 1.0 } else { 0.0 })
}

/// Every (instruments, timesteps) grid in a (B, C, I, T) tensor, batch-major.
pub fn sample_grids<'a>(tensor: ArrayView4<'a, f32>) -> Vec<ArrayView2<'a, f32>> {
    let (batch, channels, _, _) = tensor.dim();
    let mut grids = Vec::with_capacity(batch * channels);
    for b in 0..batch {
        let sample = tensor.index_axis_move(Axis(0), b);
        for c in 0..channels {
            grids.push(sample.index_axis_move(Axis(0), c));
        }
    }
    grids
}

/// Fails with [`ModelError::ShapeMismatch`] unless both tensors share a shape.
pub fn ensure_same_shape(expected: &[usize], found: &[usize]) -> ModelResult<()> {
    if expected != found {
        return Err(ModelError::shape(expected, found));
    }
    Ok(())
}
