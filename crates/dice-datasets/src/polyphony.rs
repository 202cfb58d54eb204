//! Polyphony validity oracle.
//!
//! [`valid_polyphony_requirements`] is the only definition of pattern validity.
//! Rejection sampling, augmentation, the training losses, and test-time
//! accuracy all call it instead of re-deriving the rule.

use ndarray::{Array1, ArrayView2, Axis};

/// Per-timestep polyphony: the column sums of an instrument x timestep grid.
pub fn polyphony(grid: ArrayView2<'_, f32>) -> Array1<f32> {
    grid.sum_axis(Axis(0))
}

/// Returns `false` if any timestep exceeds `max_polyphony`, or if more than
/// `max_num_events_with_full_polyphony` timesteps sit exactly at
/// `max_polyphony`. Returns `true` otherwise.
///
/// Works on binary grids as well as soft (model output) values. Never panics.
pub fn valid_polyphony_requirements(
    grid: ArrayView2<'_, f32>,
    max_polyphony: usize,
    max_num_events_with_full_polyphony: usize,
) -> bool {
    let limit = max_polyphony as f32;
    let mut full_events = 0usize;

    for column in polyphony(grid).iter() {
        if *column > limit {
            return false;
        }
        if *column == limit {
            full_events += 1;
        }
    }

    full_events <= max_num_events_with_full_polyphony
}
