//! JSON model checkpoints.

use std::path::Path;

use dice_datasets::create_rng;
use serde::{Deserialize, Serialize};

use crate::architecture::{create_model, DiceArchitecture, DiceModel};
use crate::error::{ModelError, ModelResult};
use crate::loss::DiceLoss;
use crate::train::TrainingConfig;

/// Everything needed to rebuild a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub architecture: DiceArchitecture,
    pub loss: DiceLoss,
    pub instruments: usize,
    pub timesteps: usize,
    /// Flattened parameters in layer order.
    pub parameters: Vec<f32>,
    pub training: TrainingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl ModelCheckpoint {
    /// Snapshots `model` together with how it was trained.
    pub fn capture(
        model: &dyn DiceModel,
        loss: DiceLoss,
        training: TrainingConfig,
        accuracy: Option<f64>,
    ) -> Self {
        let (instruments, timesteps) = model.input_shape();
        Self {
            architecture: model.architecture(),
            loss,
            instruments,
            timesteps,
            parameters: model.parameters_flat(),
            training,
            accuracy,
        }
    }

    /// Rebuilds the model in evaluation mode.
    pub fn restore(&self) -> ModelResult<Box<dyn DiceModel>> {
        // Initial weights are overwritten below, any seed works.
        let mut model = create_model(
            self.architecture,
            self.instruments,
            self.timesteps,
            &mut create_rng(self.training.seed),
        )?;
        model.load_parameters_flat(&self.parameters)?;
        model.set_training(false);
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let checkpoint: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        if checkpoint.parameters.iter().any(|p| !p.is_finite()) {
            return Err(ModelError::Checkpoint {
                message: "parameters contain non-finite values".to_string(),
            });
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_save_load_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut model =
            create_model(DiceArchitecture::LinearDenoiser, 2, 4, &mut create_rng(3)).unwrap();
        let checkpoint = ModelCheckpoint::capture(
            model.as_ref(),
            DiceLoss::L1PolyphonyPenalty,
            TrainingConfig::default(),
            Some(0.5),
        );
        checkpoint.save(&path).unwrap();

        let loaded = ModelCheckpoint::load(&path).unwrap();
        assert_eq!(loaded, checkpoint);

        let mut restored = loaded.restore().unwrap();
        let input = Array4::<f32>::from_elem((2, 1, 2, 4), 0.3);
        model.set_training(false);
        assert_eq!(
            restored.forward(input.view()).unwrap(),
            model.forward(input.view()).unwrap()
        );
    }

    #[test]
    fn test_restore_rejects_wrong_parameter_count() {
        let model =
            create_model(DiceArchitecture::LinearDenoiser, 2, 4, &mut create_rng(3)).unwrap();
        let mut checkpoint = ModelCheckpoint::capture(
            model.as_ref(),
            DiceLoss::MsePolyphonyPenalty,
            TrainingConfig::default(),
            None,
        );
        checkpoint.parameters.pop();
        assert_eq!(checkpoint.restore().err().unwrap().code(), "MODEL_007");
    }
}
