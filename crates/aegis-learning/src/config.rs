//! Configuration types for the treatment training pipeline.
//!
//! This module provides [`TrainingConfig`] and its builder, as well as the
//! [`ClassWeight`] enum.
//!
//! # Example
//!
//! ```
//! use aegis_learning::{ClassWeight, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .n_splits(5)
//!     .n_estimators(200)
//!     .class_weight(ClassWeight::Balanced)
//!     .build()
//!     .expect("valid config");
//! ```

use aegis_processing::features::columns;
use serde::{Deserialize, Serialize};

use crate::error::LearningError;

/// How classes are weighted when fitting the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample counts once.
    Uniform,

    /// Weight each class by `n_samples / (n_classes * class_count)`.
    #[default]
    Balanced,
}

/// Configuration for the training pipeline.
///
/// Use [`TrainingConfig::builder()`] to construct a configuration with the builder pattern.
///
/// # Validation
///
/// The builder validates the following constraints on [`build()`](TrainingConfigBuilder::build):
/// - `n_splits` must be at least 2
/// - `n_estimators` must be at least 1
/// - `min_samples_split` must be at least 2
/// - `min_samples_leaf` must be at least 1
/// - `max_depth`, when set, must be at least 1
/// - `label_column` must not be empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Column holding the treatment name to classify (default: `treatment_name`).
    pub label_column: String,

    /// Column holding the dosage to regress (default: `dosage_mg_per_day`).
    pub dosage_column: String,

    /// Column grouping rows by patient (default: `patient_id`).
    ///
    /// When the frame lacks it, each row is its own group.
    pub group_column: String,

    /// Numeric feature columns; median-imputed then standardized.
    pub numeric_columns: Vec<String>,

    /// Categorical feature columns; constant-imputed then one-hot encoded.
    pub categorical_columns: Vec<String>,

    /// Whether every `var__` column is treated as categorical (default: true).
    pub include_variant_columns: bool,

    /// Fill value for missing categories (default: `missing`).
    pub missing_sentinel: String,

    /// Number of group folds; the first fold is held out (default: 5).
    pub n_splits: usize,

    /// Trees per forest (default: 200).
    pub n_estimators: usize,

    /// Maximum tree depth; `None` grows until leaves are pure (default: `None`).
    pub max_depth: Option<usize>,

    /// Minimum samples needed to split a node (default: 2).
    pub min_samples_split: usize,

    /// Minimum samples in each leaf (default: 1).
    pub min_samples_leaf: usize,

    /// Class weighting for the classifier (default: balanced).
    pub class_weight: ClassWeight,

    /// Whether to fit the dosage regressor (default: true).
    pub train_dosage_model: bool,

    /// Random seed for reproducibility (default: 42).
    pub random_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label_column: columns::TREATMENT_NAME.to_string(),
            dosage_column: columns::DOSAGE_MG_PER_DAY.to_string(),
            group_column: columns::PATIENT_ID.to_string(),
            numeric_columns: columns::NUMERIC.iter().map(|c| c.to_string()).collect(),
            categorical_columns: columns::CATEGORICAL.iter().map(|c| c.to_string()).collect(),
            include_variant_columns: true,
            missing_sentinel: "missing".to_string(),
            n_splits: 5,
            n_estimators: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            class_weight: ClassWeight::default(),
            train_dosage_model: true,
            random_seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.n_splits < 2 {
            return Err(LearningError::InvalidConfig(
                "n_splits must be at least 2".to_string(),
            ));
        }

        if self.n_estimators == 0 {
            return Err(LearningError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        if self.min_samples_split < 2 {
            return Err(LearningError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }

        if self.min_samples_leaf == 0 {
            return Err(LearningError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }

        if self.max_depth == Some(0) {
            return Err(LearningError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }

        if self.label_column.is_empty() {
            return Err(LearningError::InvalidConfig(
                "label_column must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`TrainingConfig`].
///
/// Created via [`TrainingConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the label column.
    #[must_use]
    pub fn label_column(mut self, column: impl Into<String>) -> Self {
        self.config.label_column = column.into();
        self
    }

    /// Set the dosage column.
    #[must_use]
    pub fn dosage_column(mut self, column: impl Into<String>) -> Self {
        self.config.dosage_column = column.into();
        self
    }

    /// Set the patient grouping column.
    #[must_use]
    pub fn group_column(mut self, column: impl Into<String>) -> Self {
        self.config.group_column = column.into();
        self
    }

    /// Replace the numeric feature columns.
    #[must_use]
    pub fn numeric_columns<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.numeric_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the categorical feature columns.
    #[must_use]
    pub fn categorical_columns<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.categorical_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Include or skip the `var__` presence columns (default: true).
    #[must_use]
    pub fn include_variant_columns(mut self, include: bool) -> Self {
        self.config.include_variant_columns = include;
        self
    }

    /// Set the fill value for missing categories (default: `missing`).
    #[must_use]
    pub fn missing_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.config.missing_sentinel = sentinel.into();
        self
    }

    /// Set the number of group folds (default: 5).
    #[must_use]
    pub fn n_splits(mut self, n: usize) -> Self {
        self.config.n_splits = n;
        self
    }

    /// Set the number of trees per forest (default: 200).
    #[must_use]
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    /// Limit tree depth.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = Some(depth);
        self
    }

    /// Set the minimum samples needed to split (default: 2).
    #[must_use]
    pub fn min_samples_split(mut self, n: usize) -> Self {
        self.config.min_samples_split = n;
        self
    }

    /// Set the minimum samples per leaf (default: 1).
    #[must_use]
    pub fn min_samples_leaf(mut self, n: usize) -> Self {
        self.config.min_samples_leaf = n;
        self
    }

    /// Set the classifier class weighting (default: balanced).
    #[must_use]
    pub fn class_weight(mut self, weight: ClassWeight) -> Self {
        self.config.class_weight = weight;
        self
    }

    /// Enable or disable the dosage regressor (default: true).
    #[must_use]
    pub fn train_dosage_model(mut self, train: bool) -> Self {
        self.config.train_dosage_model = train;
        self
    }

    /// Set the random seed for reproducibility (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if any constraint listed on
    /// [`TrainingConfig`] is violated.
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.label_column, "treatment_name");
        assert_eq!(config.dosage_column, "dosage_mg_per_day");
        assert_eq!(config.n_splits, 5);
        assert_eq!(config.n_estimators, 200);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.class_weight, ClassWeight::Balanced);
        assert_eq!(config.numeric_columns.len(), 6);
        assert!(config.categorical_columns.contains(&"disease_name".to_string()));
        assert!(config.include_variant_columns);
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::builder()
            .n_estimators(50)
            .max_depth(8)
            .numeric_columns(["age", "bmi"])
            .class_weight(ClassWeight::Uniform)
            .build()
            .unwrap();

        assert_eq!(config.n_estimators, 50);
        assert_eq!(config.max_depth, Some(8));
        assert_eq!(config.numeric_columns, vec!["age", "bmi"]);
        assert_eq!(config.class_weight, ClassWeight::Uniform);
    }

    #[test]
    fn test_invalid_n_splits() {
        let result = TrainingConfig::builder().n_splits(1).build();
        assert!(result.unwrap_err().to_string().contains("n_splits"));
    }

    #[test]
    fn test_invalid_tree_params() {
        assert!(TrainingConfig::builder().n_estimators(0).build().is_err());
        assert!(TrainingConfig::builder().min_samples_split(1).build().is_err());
        assert!(TrainingConfig::builder().min_samples_leaf(0).build().is_err());
        assert!(TrainingConfig::builder().max_depth(0).build().is_err());
    }

    #[test]
    fn test_empty_label_rejected() {
        let result = TrainingConfig::builder().label_column("").build();
        assert!(result.unwrap_err().to_string().contains("label_column"));
    }

    #[test]
    fn test_config_serialization() {
        let config = TrainingConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"class_weight\":\"balanced\""));
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_estimators, config.n_estimators);
    }
}
