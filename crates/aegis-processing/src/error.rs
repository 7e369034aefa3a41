//! Custom error types for patient-record processing.
//!
//! Two layers of errors exist:
//!
//! - [`RecordError`] describes why a *single* patient file could not be turned
//!   into a validated profile. It is recoverable: the exporter logs it and moves
//!   on to the next file.
//! - [`ProcessingError`] is the crate-level error returned by fallible
//!   operations that cannot continue (output file not writable, bad config,
//!   polars failure while building a frame).
//!
//! Errors are serializable as `{code, message}` so reports can carry them.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::schema::ValidationErrors;

/// Why a single patient record was rejected.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The file could not be read.
    #[error("unreadable file: {0}")]
    Io(#[from] std::io::Error),

    /// The file content is not valid JSON.
    #[error("invalid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Valid JSON that violates the patient-profile constraints.
    #[error("{0}")]
    Schema(#[from] ValidationErrors),
}

impl RecordError {
    /// Short machine-readable kind, used in export reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::MalformedJson(_) => "malformed_json",
            Self::Schema(_) => "schema",
        }
    }

    /// The validation errors, if this is a schema failure.
    pub fn violations(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Schema(errors) => Some(errors),
            _ => None,
        }
    }
}

/// The main error type for the processing crate.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A record file could not be loaded.
    #[error("Record '{path}' rejected: {source}")]
    Record {
        path: String,
        #[source]
        source: RecordError,
    },

    /// Treatment endpoint returned something unusable.
    #[error("Treatment client error: {0}")]
    Client(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with the "client" feature).
    #[cfg(feature = "client")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap a per-record failure together with the file it came from.
    pub fn record(path: impl Into<String>, source: RecordError) -> Self {
        ProcessingError::Record {
            path: path.into(),
            source,
        }
    }

    /// Get error code for report consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Record { source, .. } => match source {
                RecordError::Io(_) => "RECORD_UNREADABLE",
                RecordError::MalformedJson(_) => "RECORD_MALFORMED_JSON",
                RecordError::Schema(_) => "VALIDATION_FAILED",
            },
            Self::Client(_) => "CLIENT_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "client")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }
}

impl From<crate::config::ConfigValidationError> for ProcessingError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        ProcessingError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

static_assertions::assert_impl_all!(ProcessingError: Send, Sync);

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Io(e).with_context(context))
    }
}
