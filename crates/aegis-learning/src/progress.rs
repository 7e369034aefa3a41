//! Progress reporting for the training pipeline.
//!
//! A [`ProgressCallback`] registered with
//! [`PipelineBuilder::on_progress`](crate::PipelineBuilder::on_progress)
//! receives one [`ProgressUpdate`] as each [`TrainingStage`] starts, and a
//! final one with [`TrainingStage::Complete`].
//!
//! # Example
//!
//! ```
//! use aegis_learning::{Pipeline, ProgressUpdate, TrainingConfig};
//!
//! let pipeline = Pipeline::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!     })
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The current stage of the training pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    /// Dropping unlabelled rows and resolving patient groups.
    #[default]
    Preparing,

    /// Assigning patient groups to folds.
    Splitting,

    /// Fitting imputation, scaling and encoding on the training rows.
    Preprocessing,

    /// Growing the treatment forest.
    TrainingClassifier,

    /// Growing the dosage forest. Skipped when disabled.
    TrainingRegressor,

    /// Scoring the held-out rows.
    Evaluating,

    /// Training finished; the outcome is available.
    Complete,
}

impl TrainingStage {
    /// All stages in execution order.
    pub const ALL: [TrainingStage; 7] = [
        TrainingStage::Preparing,
        TrainingStage::Splitting,
        TrainingStage::Preprocessing,
        TrainingStage::TrainingClassifier,
        TrainingStage::TrainingRegressor,
        TrainingStage::Evaluating,
        TrainingStage::Complete,
    ];

    /// Snake-case name of the stage.
    ///
    /// ```
    /// use aegis_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::TrainingClassifier.as_str(), "training_classifier");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Preparing => "preparing",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Preprocessing => "preprocessing",
            TrainingStage::TrainingClassifier => "training_classifier",
            TrainingStage::TrainingRegressor => "training_regressor",
            TrainingStage::Evaluating => "evaluating",
            TrainingStage::Complete => "complete",
        }
    }

    /// Fraction of the pipeline done when this stage starts.
    #[must_use]
    pub fn progress(&self) -> f64 {
        match self {
            TrainingStage::Preparing => 0.0,
            TrainingStage::Splitting => 0.05,
            TrainingStage::Preprocessing => 0.1,
            TrainingStage::TrainingClassifier => 0.2,
            TrainingStage::TrainingRegressor => 0.6,
            TrainingStage::Evaluating => 0.9,
            TrainingStage::Complete => 1.0,
        }
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`TrainingStage`] name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = TrainingStage::ALL.iter().map(TrainingStage::as_str).collect();
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: {}",
            self.invalid_value,
            valid.join(", ")
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrainingStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ParseTrainingStageError {
                invalid_value: s.to_string(),
            })
    }
}

/// A progress update from the training pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    /// The stage that just started.
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0; never decreases within a run.
    pub progress: f64,

    /// Human-readable status message, e.g. "Growing 200 treatment trees".
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: TrainingStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.progress(),
            message: message.into(),
        }
    }
}

/// Callback receiving [`ProgressUpdate`]s; must be thread-safe.
///
/// ```
/// use std::sync::Arc;
/// use aegis_learning::{ProgressCallback, ProgressUpdate};
///
/// let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
///     println!("[{}] {}", update.stage, update.message);
/// });
/// ```
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trips_through_str() {
        for stage in TrainingStage::ALL {
            assert_eq!(stage.as_str().parse::<TrainingStage>(), Ok(stage));
        }
    }

    #[test]
    fn test_unknown_stage() {
        let err = "training".parse::<TrainingStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "training");
        assert!(err.to_string().contains("Valid values are: preparing"));
    }

    #[test]
    fn test_progress_is_monotonic() {
        let values: Vec<f64> = TrainingStage::ALL.iter().map(|s| s.progress()).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(values.last(), Some(&1.0));
    }

    #[test]
    fn test_update_carries_stage_progress() {
        let update = ProgressUpdate::new(TrainingStage::Evaluating, "Scoring");
        assert_eq!(update.progress, 0.9);
        assert_eq!(update.message, "Scoring");
        assert_eq!(ProgressUpdate::default().stage, TrainingStage::Preparing);
    }
}
