//! Error types for dataset generation and loading.

use thiserror::Error;

/// Result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Errors that can occur while loading configs, building patterns, or
/// assembling datasets.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Malformed generation config or pattern source.
    #[error("invalid config: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Trigger lengths or instrument counts that do not line up.
    #[error("shape mismatch: {message}")]
    Shape {
        /// Error message.
        message: String,
    },

    /// Rejection sampling gave up before finding a valid pattern.
    #[error("no pattern satisfied the polyphony requirements after {attempts} attempts")]
    GenerationExhausted {
        /// Number of candidates drawn before giving up.
        attempts: usize,
    },

    /// Thread pool for the selected device could not be built.
    #[error("device error: {message}")]
    Device {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatasetError {
    /// Creates a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a shape error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    /// Returns a stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            DatasetError::Config { .. } => "DATASET_001",
            DatasetError::Shape { .. } => "DATASET_002",
            DatasetError::GenerationExhausted { .. } => "DATASET_003",
            DatasetError::Device { .. } => "DATASET_004",
            DatasetError::Io(_) => "DATASET_005",
            DatasetError::Json(_) => "DATASET_006",
        }
    }
}
