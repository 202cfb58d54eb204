//! Error types for models, losses, and training.

use dice_datasets::DatasetError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building, training, or restoring models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Tensor shapes do not line up.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Found shape.
        found: Vec<usize>,
    },

    /// Unrecognised architecture tag.
    #[error("unknown architecture '{0}'")]
    UnknownArchitecture(String),

    /// Unrecognised loss tag.
    #[error("unknown loss function '{0}'")]
    UnknownLoss(String),

    /// Invalid training or model parameter.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Error message.
        message: String,
    },

    /// `backward` called without a preceding `forward`.
    #[error("backward pass requested before a forward pass")]
    MissingForward,

    /// Not enough patterns to train on.
    #[error("dataset is empty: {0}")]
    EmptyDataset(String),

    /// Checkpoint could not be restored.
    #[error("checkpoint error: {message}")]
    Checkpoint {
        /// Error message.
        message: String,
    },

    /// Dataset error.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Creates an invalid parameter error.
    pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a shape mismatch error from two shapes.
    pub fn shape(expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// Returns a stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::ShapeMismatch { .. } => "MODEL_001",
            ModelError::UnknownArchitecture(_) => "MODEL_002",
            ModelError::UnknownLoss(_) => "MODEL_003",
            ModelError::InvalidParameter { .. } => "MODEL_004",
            ModelError::MissingForward => "MODEL_005",
            ModelError::EmptyDataset(_) => "MODEL_006",
            ModelError::Checkpoint { .. } => "MODEL_007",
            ModelError::Dataset(e) => e.code(),
            ModelError::Io(_) => "MODEL_008",
            ModelError::Json(_) => "MODEL_009",
        }
    }
}
