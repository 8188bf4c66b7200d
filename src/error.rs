use std::collections::BTreeMap;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset is missing required columns or cannot be parsed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Bundle storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedder could not be loaded or failed to embed
    #[error("Embedder error ({model}): {message}")]
    Embedder { model: String, message: String },

    /// Too few usable category classes to learn anything
    #[error("Label cardinality error: need at least 2 distinct categories, found {distinct} (counts: {counts:?})")]
    LabelCardinality {
        distinct: usize,
        counts: BTreeMap<String, usize>,
    },

    /// Feature vector does not have the dimension the bundle was trained on
    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// No trained bundle available
    #[error("Model not trained: {0}")]
    NotTrained(String),

    /// Classifier fitting or inference failed
    #[error("Training error: {0}")]
    Training(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Dataset(_) => "DATASET_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Embedder { .. } => "EMBEDDER_ERROR",
            AppError::LabelCardinality { .. } => "LABEL_CARDINALITY_ERROR",
            AppError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            AppError::NotTrained(_) => "MODEL_NOT_TRAINED",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error means the caller must run training first
    pub fn is_not_trained(&self) -> bool {
        matches!(self, AppError::NotTrained(_))
    }

    pub(crate) fn embedder(model: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Embedder {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err.to_string())
    }
}

/// Conversion from sled::Error
impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
