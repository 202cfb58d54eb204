//! Denoising architectures and the model factory.
//!
//! Models map a noisy (batch, 1, instruments, timesteps) tensor to a
//! reconstruction of the same shape with values in (0, 1). Internally each
//! sample grid is flattened row-major into a feature vector.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array4, ArrayView4};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::layers::{Activation, Dense};

/// Hidden width of the autoencoder's outer layers.
const AUTOENCODER_HIDDEN: usize = 128;
/// Width of the autoencoder's bottleneck.
const AUTOENCODER_BOTTLENECK: usize = 64;

/// Architecture selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiceArchitecture {
    #[serde(rename = "dense_auto_enc")]
    DenseAutoencoder,
    #[serde(rename = "linear_denoiser")]
    LinearDenoiser,
}

impl DiceArchitecture {
    pub const ALL: [DiceArchitecture; 2] = [
        DiceArchitecture::DenseAutoencoder,
        DiceArchitecture::LinearDenoiser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiceArchitecture::DenseAutoencoder => "dense_auto_enc",
            DiceArchitecture::LinearDenoiser => "linear_denoiser",
        }
    }
}

impl fmt::Display for DiceArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiceArchitecture {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        DiceArchitecture::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| ModelError::UnknownArchitecture(s.to_string()))
    }
}

/// A trainable denoising model.
pub trait DiceModel: Send {
    fn architecture(&self) -> DiceArchitecture;

    /// Expected (instruments, timesteps) of every sample grid.
    fn input_shape(&self) -> (usize, usize);

    /// Switches between training mode (activations cached for `backward`)
    /// and evaluation mode.
    fn set_training(&mut self, training: bool);

    fn forward(&mut self, input: ArrayView4<'_, f32>) -> ModelResult<Array4<f32>>;

    /// Back-propagates the loss gradient of the last training-mode
    /// `forward` and applies one optimizer step.
    fn backward(&mut self, grads: ArrayView4<'_, f32>, learning_rate: f32) -> ModelResult<()>;

    fn parameter_count(&self) -> usize;

    fn parameters_flat(&self) -> Vec<f32>;

    fn load_parameters_flat(&mut self, params: &[f32]) -> ModelResult<()>;
}

/// Builds the model selected by `architecture` for grids of
/// `instruments` x `timesteps`.
pub fn create_model<R: Rng + ?Sized>(
    architecture: DiceArchitecture,
    instruments: usize,
    timesteps: usize,
    rng: &mut R,
) -> ModelResult<Box<dyn DiceModel>> {
    if instruments == 0 || timesteps == 0 {
        return Err(ModelError::invalid_param(
            "input_shape",
            format!("{}x{} grid has no cells", instruments, timesteps),
        ));
    }
    let features = instruments * timesteps;
    let layers = match architecture {
        DiceArchitecture::DenseAutoencoder => vec![
            Dense::new(features, AUTOENCODER_HIDDEN, Activation::Relu, rng)?,
            Dense::new(AUTOENCODER_HIDDEN, AUTOENCODER_BOTTLENECK, Activation::Relu, rng)?,
            Dense::new(AUTOENCODER_BOTTLENECK, AUTOENCODER_HIDDEN, Activation::Relu, rng)?,
            Dense::new(AUTOENCODER_HIDDEN, features, Activation::Sigmoid, rng)?,
        ],
        DiceArchitecture::LinearDenoiser => {
            vec![Dense::new(features, features, Activation::Sigmoid, rng)?]
        }
    };
    Ok(Box::new(DenseStack {
        architecture,
        instruments,
        timesteps,
        layers,
        training: true,
    }))
}

/// A chain of dense layers over flattened sample grids.
#[derive(Debug)]
struct DenseStack {
    architecture: DiceArchitecture,
    instruments: usize,
    timesteps: usize,
    layers: Vec<Dense>,
    training: bool,
}

impl DenseStack {
    fn check_shape(&self, shape: &[usize]) -> ModelResult<()> {
        let expected = [shape[0], 1, self.instruments, self.timesteps];
        if shape != expected {
            return Err(ModelError::shape(&expected, shape));
        }
        Ok(())
    }

    fn flatten(&self, tensor: ArrayView4<'_, f32>) -> ModelResult<Array2<f32>> {
        let batch = tensor.shape()[0];
        let features = self.instruments * self.timesteps;
        let flat = tensor
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((batch, features))
            .map_err(|_| ModelError::shape(&[batch, features], tensor.shape()))?;
        Ok(flat)
    }

    fn unflatten(&self, matrix: Array2<f32>) -> ModelResult<Array4<f32>> {
        let batch = matrix.nrows();
        let shape = (batch, 1, self.instruments, self.timesteps);
        let found = matrix.shape().to_vec();
        matrix
            .into_shape_with_order(shape)
            .map_err(|_| ModelError::shape(&[shape.0, shape.1, shape.2, shape.3], &found))
    }
}

impl DiceModel for DenseStack {
    fn architecture(&self) -> DiceArchitecture {
        self.architecture
    }

    fn input_shape(&self) -> (usize, usize) {
        (self.instruments, self.timesteps)
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        if !training {
            self.layers.iter_mut().for_each(Dense::clear_cache);
        }
    }

    fn forward(&mut self, input: ArrayView4<'_, f32>) -> ModelResult<Array4<f32>> {
        self.check_shape(input.shape())?;
        let mut activations = self.flatten(input)?;
        for layer in &mut self.layers {
            activations = layer.forward(&activations, self.training)?;
        }
        self.unflatten(activations)
    }

    fn backward(&mut self, grads: ArrayView4<'_, f32>, learning_rate: f32) -> ModelResult<()> {
        self.check_shape(grads.shape())?;
        let mut grads = self.flatten(grads)?;
        for layer in self.layers.iter_mut().rev() {
            grads = layer.backward(&grads, learning_rate)?;
        }
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        self.layers.iter().map(Dense::parameter_count).sum()
    }

    fn parameters_flat(&self) -> Vec<f32> {
        self.layers
            .iter()
            .flat_map(Dense::parameters_flat)
            .collect()
    }

    fn load_parameters_flat(&mut self, params: &[f32]) -> ModelResult<()> {
        let expected = self.parameter_count();
        if params.len() != expected {
            return Err(ModelError::Checkpoint {
                message: format!(
                    "{} expects {} parameters, got {}",
                    self.architecture,
                    expected,
                    params.len()
                ),
            });
        }
        let mut offset = 0;
        for layer in &mut self.layers {
            offset += layer.load_parameters_flat(&params[offset..])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dice_datasets::create_rng;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_architecture_tags() {
        for arch in DiceArchitecture::ALL {
            assert_eq!(arch.as_str().parse::<DiceArchitecture>().unwrap(), arch);
        }
        let err = "conv_auto_enc".parse::<DiceArchitecture>().unwrap_err();
        assert_eq!(err.code(), "MODEL_002");
    }

    #[test]
    fn test_forward_preserves_shape() {
        for arch in DiceArchitecture::ALL {
            let mut model = create_model(arch, 4, 16, &mut create_rng(3)).unwrap();
            let output = model.forward(Array4::<f32>::zeros((5, 1, 4, 16)).view()).unwrap();
            assert_eq!(output.dim(), (5, 1, 4, 16));
            assert!(output.iter().all(|v| *v > 0.0 && *v < 1.0));
        }
    }

    #[test]
    fn test_forward_rejects_wrong_grid() {
        let mut model = create_model(DiceArchitecture::LinearDenoiser, 4, 16, &mut create_rng(3))
            .unwrap();
        let err = model
            .forward(Array4::<f32>::zeros((2, 1, 4, 8)).view())
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_001");
        assert!(model.forward(Array4::<f32>::zeros((2, 2, 4, 16)).view()).is_err());
    }

    #[test]
    fn test_parameter_counts() {
        let linear =
            create_model(DiceArchitecture::LinearDenoiser, 2, 4, &mut create_rng(0)).unwrap();
        assert_eq!(linear.parameter_count(), 8 * 8 + 8);

        let dense =
            create_model(DiceArchitecture::DenseAutoencoder, 2, 4, &mut create_rng(0)).unwrap();
        assert_eq!(
            dense.parameter_count(),
            (8 * 128 + 128) + (128 * 64 + 64) + (64 * 128 + 128) + (128 * 8 + 8)
        );
        assert_eq!(dense.parameters_flat().len(), dense.parameter_count());
    }

    #[test]
    fn test_evaluation_mode_blocks_backward() {
        let mut model =
            create_model(DiceArchitecture::LinearDenoiser, 2, 4, &mut create_rng(1)).unwrap();
        let input = Array4::<f32>::zeros((1, 1, 2, 4));

        model.set_training(false);
        model.forward(input.view()).unwrap();
        assert!(model.backward(input.view(), 0.01).is_err());

        model.set_training(true);
        model.forward(input.view()).unwrap();
        model.backward(input.view(), 0.01).unwrap();
    }

    #[test]
    fn test_load_parameters_reproduces_outputs() {
        let mut source =
            create_model(DiceArchitecture::DenseAutoencoder, 2, 4, &mut create_rng(10)).unwrap();
        let mut restored =
            create_model(DiceArchitecture::DenseAutoencoder, 2, 4, &mut create_rng(11)).unwrap();
        restored.load_parameters_flat(&source.parameters_flat()).unwrap();

        let input = Array4::from_shape_fn((3, 1, 2, 4), |(b, _, i, t)| ((b + i + t) % 2) as f32);
        assert_eq!(
            source.forward(input.view()).unwrap(),
            restored.forward(input.view()).unwrap()
        );
        assert!(restored.load_parameters_flat(&[0.0; 4]).is_err());
    }
}
