//! Patient-record processing library.
//!
//! Turns nested patient JSON records into two kinds of training data.
//!
//! # Overview
//!
//! - **Schema Validation**: [`schema::PatientProfile`] enforces the record shape and
//!   reports every violated constraint at once
//! - **Fine-Tuning Export**: [`FineTuningExporter`] writes one `{input, output}` JSON
//!   line per valid record for language-model fine-tuning
//! - **Tabular Features**: [`build_feature_frame`] flattens raw records into a polars
//!   `DataFrame` with derived BMI and genetic-variant presence flags
//! - **Treatment Client**: optional blocking client for the remote treatment
//!   endpoint (feature `client`, on by default)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aegis_processing::{ExportConfig, FineTuningExporter};
//!
//! let config = ExportConfig::builder()
//!     .source_folders(["Archive/Package_1", "Archive/Package_2"])
//!     .output_path("gemini_train.jsonl")
//!     .build()?;
//!
//! let report = FineTuningExporter::new(config).run()?;
//! println!("{} exported, {} skipped", report.exported(), report.skipped());
//! ```
//!
//! # Tabular Features
//!
//! ```rust,ignore
//! use aegis_processing::build_feature_frame;
//!
//! let records: Vec<serde_json::Value> = load_records()?;
//! let df = build_feature_frame(&records)?;
//! println!("{:?}", df.shape());
//! ```

#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod schema;
pub mod utils;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use client::{TreatmentClient, strip_output_marker};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigValidationError, ExportConfig, ExportConfigBuilder,
};
pub use error::{ProcessingError, RecordError, Result as ProcessingResult, ResultExt};
pub use export::{
    ExportReport, FileOutcome, FileStatus, FineTuningExporter, TrainingPair, describe_patient,
    format_number, format_treatment, format_treatments,
};
pub use features::{FlatRecord, build_feature_frame, flatten_record, variant_column};
pub use schema::{FieldViolation, PatientProfile, ValidationErrors, json_schema};

