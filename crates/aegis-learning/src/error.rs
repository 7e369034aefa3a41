//! Error types for the aegis-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Example
//!
//! ```no_run
//! use aegis_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = TrainingConfig::builder().n_estimators(200).build()?;
//!     Ok(config)
//! }
//! ```

use thiserror::Error;

/// The main error type for aegis-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the pipeline.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or inference.
    ///
    /// Common causes:
    /// - Fewer distinct patients than split folds
    /// - No labelled rows left after filtering
    /// - Feature rows of inconsistent width
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A required column was not found in the DataFrame.
    ///
    /// Column names are case-sensitive.
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// An error occurred during inference/prediction.
    ///
    /// Common causes:
    /// - Model used before it was fitted
    /// - Input features don't match the width seen during training
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Polars error while reading the feature frame.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl LearningError {
    /// Get error code for report consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InferenceError(_) => "INFERENCE_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }
}

impl From<aegis_processing::ProcessingError> for LearningError {
    fn from(err: aegis_processing::ProcessingError) -> Self {
        LearningError::InvalidData(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl serde::Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LearningError::ColumnNotFound("treatment_name".into()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(LearningError::InvalidData("x".into()).error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_display() {
        let err = LearningError::ColumnNotFound("treatment_name".into());
        assert_eq!(err.to_string(), "Column 'treatment_name' not found");
    }

    #[test]
    fn test_serialization() {
        let err = LearningError::InvalidConfig("n_splits must be at least 2".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_CONFIG");
        assert!(json["message"].as_str().unwrap().contains("n_splits"));
    }
}
