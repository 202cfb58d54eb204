//! AdamW with decoupled weight decay.

use ndarray::Array2;

use crate::error::{ModelError, ModelResult};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Per-parameter-matrix AdamW state.
#[derive(Debug, Clone)]
pub struct AdamW {
    weight_decay: f32,
    step: usize,
    first_moment: Array2<f32>,
    second_moment: Array2<f32>,
}

impl AdamW {
    /// Creates optimizer state for a parameter matrix of `shape`.
    ///
    /// Negative or non-finite `weight_decay` is treated as zero.
    pub fn new(shape: (usize, usize), weight_decay: f32) -> Self {
        let weight_decay = if weight_decay.is_finite() && weight_decay >= 0.0 {
            weight_decay
        } else {
            0.0
        };
        Self {
            weight_decay,
            step: 0,
            first_moment: Array2::zeros(shape),
            second_moment: Array2::zeros(shape),
        }
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> usize {
        self.step
    }

    /// Applies one update to `params`.
    ///
    /// Fails without touching any state when the learning rate is not a
    /// positive finite number or a shape disagrees with the optimizer's.
    pub fn step(
        &mut self,
        params: &mut Array2<f32>,
        grads: &Array2<f32>,
        learning_rate: f32,
    ) -> ModelResult<()> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(ModelError::invalid_param(
                "learning_rate",
                format!("must be a positive finite number, got {}", learning_rate),
            ));
        }
        if params.raw_dim() != self.first_moment.raw_dim() {
            return Err(ModelError::shape(self.first_moment.shape(), params.shape()));
        }
        if grads.raw_dim() != self.first_moment.raw_dim() {
            return Err(ModelError::shape(self.first_moment.shape(), grads.shape()));
        }

        self.step = self.step.saturating_add(1);

        // Decay is applied to the parameters, not folded into the gradient.
        if self.weight_decay > 0.0 {
            let decay = learning_rate * self.weight_decay;
            params.mapv_inplace(|p| p - decay * p);
        }

        self.first_moment = &self.first_moment * BETA1 + grads * (1.0 - BETA1);
        self.second_moment = &self.second_moment * BETA2 + grads.mapv(|g| g * g) * (1.0 - BETA2);

        let t = self.step as f32;
        let first_correction = (1.0 - BETA1.powf(t)).max(1e-12);
        let second_correction = (1.0 - BETA2.powf(t)).max(1e-12);

        ndarray::Zip::from(params)
            .and(&self.first_moment)
            .and(&self.second_moment)
            .for_each(|p, &m, &v| {
                let m_hat = m / first_correction;
                let v_hat = v / second_correction;
                *p -= learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_moves_against_gradient() {
        let mut params = Array2::from_elem((1, 2), 1.0f32);
        let grads = Array2::from_shape_vec((1, 2), vec![0.5, -0.5]).unwrap();
        let mut optimizer = AdamW::new((1, 2), 0.0);

        optimizer.step(&mut params, &grads, 0.1).unwrap();

        assert_eq!(optimizer.steps(), 1);
        // First bias-corrected step has magnitude ~lr.
        assert!((params[[0, 0]] - 0.9).abs() < 1e-4);
        assert!((params[[0, 1]] - 1.1).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_learning_rate_is_rejected() {
        let mut params = Array2::from_elem((2, 2), 1.0f32);
        let grads = Array2::from_elem((2, 2), 1.0f32);
        let mut optimizer = AdamW::new((2, 2), 0.01);

        for learning_rate in [0.0, -0.1, f32::NAN] {
            let err = optimizer.step(&mut params, &grads, learning_rate).unwrap_err();
            assert_eq!(err.code(), "MODEL_004");
        }

        assert_eq!(optimizer.steps(), 0);
        assert_eq!(params, Array2::from_elem((2, 2), 1.0f32));
    }

    #[test]
    fn test_mismatched_gradient_is_rejected() {
        let mut params = Array2::from_elem((2, 2), 1.0f32);
        let grads = Array2::from_elem((2, 3), 1.0f32);
        let mut optimizer = AdamW::new((2, 2), 0.0);

        let err = optimizer.step(&mut params, &grads, 0.1).unwrap_err();
        assert_eq!(err.code(), "MODEL_001");
        assert_eq!(optimizer.steps(), 0);
    }

    #[test]
    fn test_weight_decay_shrinks_params() {
        let mut params = Array2::from_elem((1, 1), 2.0f32);
        let grads = Array2::zeros((1, 1));
        let mut optimizer = AdamW::new((1, 1), 0.5);

        optimizer.step(&mut params, &grads, 0.1).unwrap();

        assert!((params[[0, 0]] - 1.9).abs() < 1e-6);
    }
}
