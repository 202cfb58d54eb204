//! DICE Reconstruction Models
//!
//! Denoising models that learn to reconstruct drum patterns, plus the
//! polyphony-penalised losses and the training loop that fits them.
//!
//! # Example
//!
//! ```
//! use dice_datasets::{create_rng, Device, Pattern, PatternDataset, PolyphonyBounds, Sequence};
//! use dice_models::{create_loss, create_model, DiceArchitecture, DiceLoss, Trainer, TrainingConfig};
//!
//! let pattern = Pattern::new(vec![
//!     Sequence::from_triggers("BD", vec![1, 0, 0, 0]).unwrap(),
//!     Sequence::from_triggers("SD", vec![0, 0, 1, 0]).unwrap(),
//! ]).unwrap();
//! let dataset: PatternDataset = std::iter::repeat(pattern).take(8).collect();
//!
//! let mut model = create_model(DiceArchitecture::LinearDenoiser, 2, 4, &mut create_rng(0)).unwrap();
//! let loss = create_loss(DiceLoss::MsePolyphonyPenalty, PolyphonyBounds::new(2, 1));
//! let config = TrainingConfig { batch_size: 2, epochs: 1, ..TrainingConfig::default() };
//!
//! let report = Trainer::new(config, Device::Cpu)
//!     .train(&dataset, model.as_mut(), loss.as_ref(), |_| {})
//!     .unwrap();
//! assert_eq!(report.epochs.len(), 1);
//! ```
//!
//! # Modules
//!
//! - [`architecture`]: model selector, [`DiceModel`] trait, and factory
//! - [`loss`]: MSE and L1 losses with a polyphony penalty
//! - [`train`]: training loop and accuracy evaluation
//! - [`checkpoint`]: JSON model checkpoints
//! - [`layers`], [`optimizer`]: dense layers and AdamW
//! - [`tensor`]: batching, noise, and thresholding helpers

pub mod architecture;
pub mod checkpoint;
pub mod error;
pub mod layers;
pub mod loss;
pub mod optimizer;
pub mod tensor;
pub mod train;

pub use architecture::{create_model, DiceArchitecture, DiceModel};
pub use checkpoint::ModelCheckpoint;
pub use error::{ModelError, ModelResult};
pub use loss::{
    create_loss, DiceLoss, L1LossWithPolyphonyPenalty, LossFunction, LossOutput,
    MseLossWithPolyphonyPenalty, DEFAULT_PENALTY_FACTOR,
};
pub use train::{EpochStats, Trainer, TrainingConfig, TrainingReport};
