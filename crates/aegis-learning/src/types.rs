//! Result types returned by the training pipeline and the fitted model.
//!
//! - [`TrainingReport`]: held-out evaluation from [`Pipeline::train()`](crate::Pipeline::train)
//! - [`TreatmentPrediction`]: one row of [`TreatmentModel::predict()`](crate::TreatmentModel::predict)
//!
//! # Example
//!
//! ```ignore
//! let outcome = pipeline.train(&df)?;
//!
//! println!("{}", outcome.report.classification);
//! if let Some(mae) = outcome.report.dosage_mae {
//!     println!("Dosage MAE: {:.2} mg/day", mae);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::ClassificationReport;

/// Evaluation of a training run on the held-out group fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingReport {
    /// Rows in the input frame.
    pub n_rows: usize,

    /// Rows with a treatment label; the others are dropped before splitting.
    pub n_labelled: usize,

    /// Distinct patient groups among labelled rows.
    pub n_groups: usize,

    /// Rows in the training partition.
    pub n_train: usize,

    /// Rows in the held-out partition.
    pub n_test: usize,

    /// Preprocessed feature names in model input order.
    pub feature_names: Vec<String>,

    /// Treatment classifier metrics on the held-out rows.
    pub classification: ClassificationReport,

    /// Mean absolute dosage error on held-out rows that have a dosage.
    ///
    /// `None` when the regressor was disabled, could not be trained, or no
    /// held-out row has a dosage.
    pub dosage_mae: Option<f64>,

    /// Held-out rows that contributed to `dosage_mae`.
    pub n_dosage_test: usize,

    /// Classifier feature importance (feature, importance), descending.
    ///
    /// Importances are normalized to sum to 1.0.
    pub feature_importance: Vec<(String, f64)>,

    /// Wall-clock training time in seconds.
    pub training_time_seconds: f64,

    /// Non-fatal issues seen during training.
    pub warnings: Vec<String>,
}

impl TrainingReport {
    /// The `n` most important features.
    pub fn top_features(&self, n: usize) -> &[(String, f64)] {
        &self.feature_importance[..n.min(self.feature_importance.len())]
    }
}

/// Prediction for one patient row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TreatmentPrediction {
    /// Most probable treatment name.
    pub treatment: String,

    /// Probability of `treatment`.
    pub confidence: f64,

    /// Probability per known treatment.
    pub probabilities: BTreeMap<String, f64>,

    /// Predicted daily dosage in mg, when a dosage model was trained.
    pub dosage_mg_per_day: Option<f64>,
}
