//! Fitted treatment model for in-memory inference.
//!
//! A [`TreatmentModel`] bundles the preprocessing learned on the training
//! partition with the treatment classifier and, when one was trained, the
//! dosage regressor. It is produced by [`Pipeline::train()`](crate::Pipeline::train).
//!
//! # Example
//!
//! ```rust,ignore
//! let outcome = pipeline.train(&frame)?;
//!
//! for p in outcome.model.predict(&new_patients)? {
//!     println!("{} ({:.0}%)", p.treatment, p.confidence * 100.0);
//! }
//! ```

use std::collections::BTreeMap;

use aegis_processing::build_feature_frame;
use polars::prelude::DataFrame;
use serde_json::Value;

use crate::error::Result;
use crate::forest::{RandomForestClassifier, RandomForestRegressor, argmax};
use crate::preprocess::FittedPreprocessor;
use crate::types::TreatmentPrediction;

/// Treatment classifier and optional dosage regressor on shared preprocessing.
#[derive(Debug, Clone)]
pub struct TreatmentModel {
    preprocessor: FittedPreprocessor,
    classifier: RandomForestClassifier,
    regressor: Option<RandomForestRegressor>,
}

impl TreatmentModel {
    pub(crate) fn new(
        preprocessor: FittedPreprocessor,
        classifier: RandomForestClassifier,
        regressor: Option<RandomForestRegressor>,
    ) -> Self {
        Self {
            preprocessor,
            classifier,
            regressor,
        }
    }

    /// Predict treatment (and dosage, when available) for every row of `df`.
    ///
    /// `df` must carry the feature columns seen during training, as produced
    /// by [`build_feature_frame`]. Label and dosage columns are ignored.
    ///
    /// # Errors
    ///
    /// - [`LearningError::ColumnNotFound`](crate::LearningError::ColumnNotFound) if a fitted feature column is missing
    /// - [`LearningError::InferenceError`](crate::LearningError::InferenceError) if the models cannot score the rows
    #[must_use = "returns the predictions; use them or handle the error"]
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<TreatmentPrediction>> {
        let x = self.preprocessor.transform(df)?;
        let proba = self.classifier.predict_proba(&x)?;
        let dosage = match &self.regressor {
            Some(regressor) => Some(regressor.predict(&x)?),
            None => None,
        };

        let classes = self.classifier.classes();
        Ok(proba
            .into_iter()
            .enumerate()
            .map(|(row, p)| {
                let best = argmax(&p);
                TreatmentPrediction {
                    treatment: classes[best].clone(),
                    confidence: p[best],
                    probabilities: self.probabilities_by_class(&p),
                    dosage_mg_per_day: dosage.as_ref().map(|d| d[row]),
                }
            })
            .collect())
    }

    /// Flatten raw patient records and predict for each.
    ///
    /// Variant columns unseen in `records` are absent from the flattened
    /// frame and would fail [`predict`](Self::predict), so every fitted
    /// column missing here is filled as if the records lacked that value.
    pub fn predict_records(&self, records: &[Value]) -> Result<Vec<TreatmentPrediction>> {
        let df = build_feature_frame(records)?;
        let df = self.preprocessor.align(df)?;
        self.predict(&df)
    }

    /// Known treatment names, sorted.
    pub fn treatments(&self) -> &[String] {
        self.classifier.classes()
    }

    /// Preprocessed feature names in model input order.
    pub fn feature_names(&self) -> Vec<String> {
        self.preprocessor.feature_names()
    }

    /// Imputation, scaling and encoding learned on the training rows.
    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn has_dosage_model(&self) -> bool {
        self.regressor.is_some()
    }

    /// Classifier feature importance (feature, importance), descending.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .preprocessor
            .feature_names()
            .into_iter()
            .zip(self.classifier.feature_importances().iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    fn probabilities_by_class(&self, p: &[f64]) -> BTreeMap<String, f64> {
        self.classifier
            .classes()
            .iter()
            .cloned()
            .zip(p.iter().copied())
            .collect()
    }
}

static_assertions::assert_impl_all!(TreatmentModel: Send, Sync);
