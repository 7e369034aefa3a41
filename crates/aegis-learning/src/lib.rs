//! aegis-learning: group-aware treatment and dosage models for patient records.
//!
//! This crate trains a random-forest treatment classifier and a dosage
//! regressor on the feature frame built by
//! [`aegis_processing::build_feature_frame`], holding out whole patients so
//! the evaluation never sees a patient it trained on.
//!
//! # Features
//!
//! - **Group-wise split**: [`group_k_fold`] keeps every row of a patient in one partition
//! - **Preprocessing**: median imputation and standard scaling for numeric columns,
//!   sentinel imputation and one-hot encoding for categorical and `var__` columns
//! - **Random forests**: CART trees on bootstrap samples, grown in parallel and
//!   reproducible for a seed
//! - **Evaluation**: per-class precision/recall/F1 and dosage mean absolute error
//! - **Progress Reporting**: stage callbacks during training
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aegis_learning::{Pipeline, TrainingConfig};
//! use aegis_processing::build_feature_frame;
//!
//! let frame = build_feature_frame(&records)?;
//!
//! let config = TrainingConfig::builder()
//!     .n_estimators(200)
//!     .random_seed(42)
//!     .build()?;
//!
//! let outcome = Pipeline::builder().config(config).build()?.train(&frame)?;
//! println!("{}", outcome.report.classification);
//!
//! // In-memory inference on new records
//! let predictions = outcome.model.predict_records(&new_records)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! patient JSON ──► build_feature_frame ──► Pipeline::train
//!                                            │
//!                      group_split ◄─────────┤
//!                      ColumnPreprocessor ◄──┤
//!                      RandomForestClassifier / RandomForestRegressor
//!                                            │
//!                                            ▼
//!                          TrainingOutcome { report, model }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`](LearningError):
//!
//! - [`LearningError::InvalidConfig`] - invalid training configuration
//! - [`LearningError::InvalidData`] - unusable input, such as fewer patients than folds
//! - [`LearningError::ColumnNotFound`] - the label column or a fitted feature column is missing
//! - [`LearningError::InferenceError`] - prediction with mismatched inputs

mod config;
mod error;
pub mod forest;
mod metrics;
mod model;
mod pipeline;
mod preprocess;
mod progress;
mod split;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{ClassWeight, TrainingConfig, TrainingConfigBuilder};
// Error types
pub use error::{LearningError, Result};
// Model components
pub use forest::{ForestParams, RandomForestClassifier, RandomForestRegressor};
pub use model::TreatmentModel;
pub use preprocess::{CategoricalLevels, ColumnPreprocessor, FittedPreprocessor, NumericStats};
pub use split::{Fold, group_k_fold, group_split};
// Metrics
pub use metrics::{AverageMetrics, ClassMetrics, ClassificationReport, mean_absolute_error};
// Pipeline types
pub use pipeline::{Pipeline, PipelineBuilder, TrainingOutcome};
// Progress reporting types
pub use progress::{ParseTrainingStageError, ProgressCallback, ProgressUpdate, TrainingStage};
// Result types
pub use types::{TrainingReport, TreatmentPrediction};
