//! Denoising training loop.
//!
//! Each epoch shuffles the training split, corrupts every batch with Gaussian
//! noise, and fits the model to reconstruct the clean grids. Validation and
//! the final accuracy pass also see noisy inputs; accuracy counts the test
//! samples whose thresholded reconstruction passes the polyphony oracle.

use dice_datasets::{create_rng, DatasetSplit, Device, PatternDataset, Subset, DEFAULT_SPLIT_RATIOS};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::architecture::DiceModel;
use crate::error::{ModelError, ModelResult};
use crate::loss::{LossFunction, DEFAULT_PENALTY_FACTOR};
use crate::tensor::{add_channel_dimension, add_noise, sample_grids, stack_batch, threshold};

/// Hyperparameters for [`Trainer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Standard deviation of the Gaussian noise added to model inputs.
    pub noise_level: f32,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    /// Train / validation / test proportions.
    pub split_ratios: [f64; 3],
    /// Output values at or above this count as triggers.
    pub threshold: f32,
    pub penalty_factor: f32,
    /// Seed for the split, shuffling, and noise.
    pub seed: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            noise_level: 0.5,
            batch_size: 32,
            epochs: 5,
            learning_rate: 0.001,
            split_ratios: DEFAULT_SPLIT_RATIOS,
            threshold: 0.5,
            penalty_factor: DEFAULT_PENALTY_FACTOR,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if !self.noise_level.is_finite() || self.noise_level < 0.0 {
            return Err(ModelError::invalid_param(
                "noise_level",
                "must be a non-negative number",
            ));
        }
        if self.batch_size == 0 {
            return Err(ModelError::invalid_param("batch_size", "must be positive"));
        }
        if self.epochs == 0 {
            return Err(ModelError::invalid_param("epochs", "must be positive"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::invalid_param(
                "learning_rate",
                "must be a positive number",
            ));
        }
        if !self.threshold.is_finite() {
            return Err(ModelError::invalid_param("threshold", "must be finite"));
        }
        if !self.penalty_factor.is_finite() || self.penalty_factor < 0.0 {
            return Err(ModelError::invalid_param(
                "penalty_factor",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Losses recorded at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub epochs: usize,
    /// Mean per-sample training loss.
    pub train_loss: f32,
    /// Validation loss averaged over batches, `None` without validation data.
    pub validation_loss: Option<f32>,
    pub samples_seen: usize,
    /// Training targets that failed the polyphony oracle this epoch.
    pub penalized_samples: usize,
}

/// Outcome of [`Trainer::train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochStats>,
    /// Fraction of test samples whose thresholded output is valid, `None`
    /// when the test split is empty.
    pub accuracy: Option<f64>,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub test_samples: usize,
}

impl TrainingReport {
    pub fn final_epoch(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

/// Runs the training loop on a device.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
    device: Device,
}

impl Trainer {
    pub fn new(config: TrainingConfig, device: Device) -> Self {
        Self { config, device }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Trains `model` on `dataset`, calling `observer` after every epoch.
    pub fn train(
        &self,
        dataset: &PatternDataset,
        model: &mut dyn DiceModel,
        loss: &dyn LossFunction,
        mut observer: impl FnMut(&EpochStats),
    ) -> ModelResult<TrainingReport> {
        self.config.validate()?;

        let Some((instruments, timesteps)) = dataset.grid_shape()? else {
            return Err(ModelError::EmptyDataset("no patterns to train on".to_string()));
        };
        let (model_instruments, model_timesteps) = model.input_shape();
        if (instruments, timesteps) != (model_instruments, model_timesteps) {
            return Err(ModelError::shape(
                &[model_instruments, model_timesteps],
                &[instruments, timesteps],
            ));
        }

        let mut rng = create_rng(self.config.seed);
        let DatasetSplit {
            train,
            validation,
            test,
        } = dataset.random_split(self.config.split_ratios, &mut rng)?;
        if train.is_empty() {
            return Err(ModelError::EmptyDataset(format!(
                "training split of {} patterns is empty",
                dataset.len()
            )));
        }

        let pool = self.device.thread_pool()?;
        let mut epochs = Vec::with_capacity(self.config.epochs);
        let mut positions: Vec<usize> = (0..train.len()).collect();

        for epoch in 1..=self.config.epochs {
            model.set_training(true);
            positions.shuffle(&mut rng);

            let mut loss_sum = 0.0f32;
            let mut penalized_samples = 0;
            for chunk in positions.chunks(self.config.batch_size) {
                let clean = add_channel_dimension(stack_batch(&train, chunk)?);
                let noisy = add_noise(&clean, self.config.noise_level, &mut rng);
                let output = model.forward(noisy.view())?;
                let step = loss.compute(output.view(), clean.view(), self.config.penalty_factor)?;
                model.backward(step.gradient.view(), self.config.learning_rate)?;

                loss_sum += step.value * chunk.len() as f32;
                penalized_samples += step.penalized_samples;
            }

            model.set_training(false);
            let validation_loss = self.validation_loss(&validation, model, loss, &mut rng)?;

            let stats = EpochStats {
                epoch,
                epochs: self.config.epochs,
                train_loss: loss_sum / train.len() as f32,
                validation_loss,
                samples_seen: train.len(),
                penalized_samples,
            };
            observer(&stats);
            epochs.push(stats);
        }

        model.set_training(false);
        let accuracy = self.accuracy(&test, model, loss, &pool, &mut rng)?;

        Ok(TrainingReport {
            epochs,
            accuracy,
            train_samples: train.len(),
            validation_samples: validation.len(),
            test_samples: test.len(),
        })
    }

    fn batches(&self, subset: &Subset<'_>) -> Vec<Vec<usize>> {
        (0..subset.len())
            .collect::<Vec<_>>()
            .chunks(self.config.batch_size)
            .map(<[usize]>::to_vec)
            .collect()
    }

    fn validation_loss<R: Rng + ?Sized>(
        &self,
        validation: &Subset<'_>,
        model: &mut dyn DiceModel,
        loss: &dyn LossFunction,
        rng: &mut R,
    ) -> ModelResult<Option<f32>> {
        let batches = self.batches(validation);
        if batches.is_empty() {
            return Ok(None);
        }
        let mut total = 0.0f32;
        for chunk in &batches {
            let clean = add_channel_dimension(stack_batch(validation, chunk)?);
            let noisy = add_noise(&clean, self.config.noise_level, rng);
            let output = model.forward(noisy.view())?;
            total += loss
                .compute(output.view(), clean.view(), self.config.penalty_factor)?
                .value;
        }
        Ok(Some(total / batches.len() as f32))
    }

    fn accuracy<R: Rng + ?Sized>(
        &self,
        test: &Subset<'_>,
        model: &mut dyn DiceModel,
        loss: &dyn LossFunction,
        pool: &rayon::ThreadPool,
        rng: &mut R,
    ) -> ModelResult<Option<f64>> {
        if test.is_empty() {
            return Ok(None);
        }
        let bounds = loss.bounds();
        let mut valid = 0usize;
        for chunk in self.batches(test) {
            let clean = add_channel_dimension(stack_batch(test, &chunk)?);
            let noisy = add_noise(&clean, self.config.noise_level, rng);
            let output = model.forward(noisy.view())?;
            let hard = threshold(output.view(), self.config.threshold);
            let grids = sample_grids(hard.view());
            valid += pool.install(|| grids.par_iter().filter(|grid| bounds.check(**grid)).count());
        }
        Ok(Some(valid as f64 / test.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{create_model, DiceArchitecture};
    use crate::loss::{create_loss, DiceLoss};
    use dice_datasets::{Pattern, PolyphonyBounds, Sequence};
    use pretty_assertions::assert_eq;

    fn dataset(len: usize) -> PatternDataset {
        (0..len)
            .map(|i| {
                Pattern::new(vec![
                    Sequence::from_triggers("BD", vec![1, 0, 0, 0, 1, 0, (i % 2) as u8, 0]).unwrap(),
                    Sequence::from_triggers("SD", vec![0, 0, 1, 0, 0, 0, 1, 0]).unwrap(),
                    Sequence::from_triggers("HH", vec![1, 1, 1, 1, 1, 1, 1, 1]).unwrap(),
                ])
                .unwrap()
            })
            .collect()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            batch_size: 4,
            epochs: 3,
            learning_rate: 0.01,
            noise_level: 0.1,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.noise_level, 0.5);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.split_ratios, [0.75, 0.1, 0.15]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let bad = [
            TrainingConfig {
                batch_size: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                epochs: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                learning_rate: -1.0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                noise_level: f32::NAN,
                ..TrainingConfig::default()
            },
        ];
        for config in bad {
            assert_eq!(config.validate().unwrap_err().code(), "MODEL_004");
        }
    }

    #[test]
    fn test_config_fills_missing_fields() {
        let config: TrainingConfig = serde_json::from_str(r#"{"epochs": 2}"#).unwrap();
        assert_eq!(config.epochs, 2);
        assert_eq!(config.batch_size, 32);
    }

    #[test]
    fn test_train_reports_every_epoch() {
        let data = dataset(20);
        let bounds = PolyphonyBounds::new(3, 4);
        let mut model =
            create_model(DiceArchitecture::LinearDenoiser, 3, 8, &mut create_rng(0)).unwrap();
        let loss = create_loss(DiceLoss::MsePolyphonyPenalty, bounds);

        let mut seen = Vec::new();
        let report = Trainer::new(small_config(), Device::Cpu)
            .train(&data, model.as_mut(), loss.as_ref(), |stats| seen.push(stats.epoch))
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(report.epochs.len(), 3);
        assert_eq!(report.train_samples, 15);
        assert_eq!(report.validation_samples, 2);
        assert_eq!(report.test_samples, 3);
        let accuracy = report.accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
        assert!(report.epochs.iter().all(|e| e.validation_loss.is_some()));
        assert!(report.epochs.iter().all(|e| e.train_loss.is_finite()));
    }

    #[test]
    fn test_training_lowers_loss() {
        let data = dataset(40);
        let bounds = PolyphonyBounds::new(3, 8);
        let mut model =
            create_model(DiceArchitecture::LinearDenoiser, 3, 8, &mut create_rng(2)).unwrap();
        let loss = create_loss(DiceLoss::MsePolyphonyPenalty, bounds);
        let config = TrainingConfig {
            epochs: 30,
            batch_size: 8,
            learning_rate: 0.01,
            noise_level: 0.1,
            ..TrainingConfig::default()
        };

        let report = Trainer::new(config, Device::Cpu)
            .train(&data, model.as_mut(), loss.as_ref(), |_| {})
            .unwrap();

        let first = report.epochs[0].train_loss;
        let last = report.final_epoch().unwrap().train_loss;
        assert!(last < first, "loss went from {} to {}", first, last);
    }

    #[test]
    fn test_same_seed_same_result() {
        let data = dataset(12);
        let bounds = PolyphonyBounds::new(3, 4);
        let run = |device| {
            let mut model =
                create_model(DiceArchitecture::LinearDenoiser, 3, 8, &mut create_rng(5)).unwrap();
            let loss = create_loss(DiceLoss::L1PolyphonyPenalty, bounds);
            Trainer::new(small_config(), device)
                .train(&data, model.as_mut(), loss.as_ref(), |_| {})
                .unwrap()
        };
        assert_eq!(run(Device::Cpu), run(Device::CpuParallel { threads: 3 }));
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let mut model =
            create_model(DiceArchitecture::LinearDenoiser, 3, 8, &mut create_rng(0)).unwrap();
        let loss = create_loss(DiceLoss::MsePolyphonyPenalty, PolyphonyBounds::new(3, 4));
        let err = Trainer::new(small_config(), Device::Cpu)
            .train(&PatternDataset::default(), model.as_mut(), loss.as_ref(), |_| {})
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_006");

        let err = Trainer::new(small_config(), Device::Cpu)
            .train(&dataset(1), model.as_mut(), loss.as_ref(), |_| {})
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_006");
    }

    #[test]
    fn test_model_shape_must_match_dataset() {
        let mut model =
            create_model(DiceArchitecture::LinearDenoiser, 4, 8, &mut create_rng(0)).unwrap();
        let loss = create_loss(DiceLoss::MsePolyphonyPenalty, PolyphonyBounds::new(3, 4));
        let err = Trainer::new(small_config(), Device::Cpu)
            .train(&dataset(8), model.as_mut(), loss.as_ref(), |_| {})
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_001");
    }
}
