//! Fully connected layers with cached activations for back-propagation.

use ndarray::{Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ModelError, ModelResult};
use crate::optimizer::AdamW;

/// Weight decay applied to dense weights. Biases are not decayed.
const WEIGHT_DECAY: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Derivative expressed through the activation's output `y`.
    fn derivative(&self, y: f32) -> f32 {
        match self {
            Activation::Identity => 1.0,
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => y * (1.0 - y),
        }
    }
}

/// `y = activation(x · W + b)` over rows of a (batch, features) matrix.
#[derive(Debug, Clone)]
pub struct Dense {
    weights: Array2<f32>,
    bias: Array2<f32>,
    activation: Activation,
    cached_input: Option<Array2<f32>>,
    cached_output: Option<Array2<f32>>,
    weights_optimizer: AdamW,
    bias_optimizer: AdamW,
}

impl Dense {
    /// He-initialised layer mapping `inputs` features to `outputs`.
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> ModelResult<Self> {
        if inputs == 0 || outputs == 0 {
            return Err(ModelError::invalid_param(
                "layer",
                format!("dense layer {}x{} has no parameters", inputs, outputs),
            ));
        }
        let std_dev = (2.0 / inputs as f32).sqrt();
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| ModelError::invalid_param("layer", e.to_string()))?;

        Ok(Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| normal.sample(rng)),
            bias: Array2::zeros((1, outputs)),
            activation,
            cached_input: None,
            cached_output: None,
            weights_optimizer: AdamW::new((inputs, outputs), WEIGHT_DECAY),
            bias_optimizer: AdamW::new((1, outputs), 0.0),
        })
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    /// Runs the layer. With `cache` set, keeps what `backward` needs.
    pub fn forward(&mut self, input: &Array2<f32>, cache: bool) -> ModelResult<Array2<f32>> {
        if input.ncols() != self.inputs() {
            return Err(ModelError::shape(
                &[input.nrows(), self.inputs()],
                input.shape(),
            ));
        }
        let activation = self.activation;
        let output = (input.dot(&self.weights) + &self.bias).mapv(|x| activation.apply(x));

        if cache {
            self.cached_input = Some(input.clone());
            self.cached_output = Some(output.clone());
        } else {
            self.clear_cache();
        }
        Ok(output)
    }

    /// Back-propagates `grads` (w.r.t. this layer's output), updates the
    /// parameters, and returns the gradient w.r.t. the input.
    pub fn backward(&mut self, grads: &Array2<f32>, learning_rate: f32) -> ModelResult<Array2<f32>> {
        let (Some(input), Some(output)) = (self.cached_input.take(), self.cached_output.take())
        else {
            return Err(ModelError::MissingForward);
        };
        if grads.raw_dim() != output.raw_dim() {
            return Err(ModelError::shape(output.shape(), grads.shape()));
        }

        let activation = self.activation;
        let mut pre_activation_grads = grads.clone();
        ndarray::Zip::from(&mut pre_activation_grads)
            .and(&output)
            .for_each(|g, &y| *g *= activation.derivative(y));

        let weight_grads = input.t().dot(&pre_activation_grads);
        let bias_grads = pre_activation_grads.sum_axis(Axis(0)).insert_axis(Axis(0));
        let input_grads = pre_activation_grads.dot(&self.weights.t());

        self.weights_optimizer
            .step(&mut self.weights, &weight_grads, learning_rate)?;
        self.bias_optimizer
            .step(&mut self.bias, &bias_grads, learning_rate)?;

        Ok(input_grads)
    }

    pub fn clear_cache(&mut self) {
        self.cached_input = None;
        self.cached_output = None;
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    /// Weights (row-major) followed by biases.
    pub fn parameters_flat(&self) -> Vec<f32> {
        self.weights.iter().chain(self.bias.iter()).copied().collect()
    }

    /// Loads parameters from the front of `params`, returning how many were used.
    pub fn load_parameters_flat(&mut self, params: &[f32]) -> ModelResult<usize> {
        let needed = self.parameter_count();
        if params.len() < needed {
            return Err(ModelError::Checkpoint {
                message: format!(
                    "dense layer needs {} parameters, {} left",
                    needed,
                    params.len()
                ),
            });
        }
        let (weights, bias) = params[..needed].split_at(self.weights.len());
        for (slot, value) in self.weights.iter_mut().zip(weights) {
            *slot = *value;
        }
        for (slot, value) in self.bias.iter_mut().zip(bias) {
            *slot = *value;
        }
        Ok(needed)
    }
}
