//! Training pipeline implementation.
//!
//! This module provides the [`Pipeline`] struct and its builder. One call to
//! [`Pipeline::train`] runs these stages in order:
//!
//! 1. **Preparing** - drop rows without a treatment label, resolve patient groups
//! 2. **Splitting** - hold out the first group fold
//! 3. **Preprocessing** - fit imputation, scaling and one-hot encoding on the training rows
//! 4. **Training** - grow the treatment forest, then the dosage forest on rows with a dosage
//! 5. **Evaluating** - score both models on the held-out rows
//!
//! # Example
//!
//! ```rust,ignore
//! use aegis_learning::{Pipeline, TrainingConfig};
//! use aegis_processing::build_feature_frame;
//!
//! let frame = build_feature_frame(&records)?;
//!
//! let pipeline = Pipeline::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|update| println!("[{}] {}", update.stage, update.message))
//!     .build()?;
//!
//! let outcome = pipeline.train(&frame)?;
//! println!("{}", outcome.report.classification);
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use aegis_processing::features::is_variant_column;
use aegis_processing::utils::{column_f64, column_labels, has_column};
use polars::prelude::{BooleanChunked, DataFrame, NewChunkedArray};
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::error::{LearningError, Result};
use crate::forest::{ForestParams, RandomForestClassifier, RandomForestRegressor};
use crate::metrics::{ClassificationReport, mean_absolute_error};
use crate::model::TreatmentModel;
use crate::preprocess::ColumnPreprocessor;
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::split::group_split;
use crate::types::TrainingReport;

/// Everything a successful training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Held-out evaluation.
    pub report: TrainingReport,

    /// Fitted models for inference.
    pub model: TreatmentModel,
}

/// The treatment training pipeline.
///
/// Use [`Pipeline::builder()`] to construct a pipeline with the builder pattern.
/// A pipeline holds no training state, so [`train()`](Self::train) can be
/// called repeatedly and from several threads.
pub struct Pipeline {
    config: TrainingConfig,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Labelled rows and their patient groups.
struct Prepared {
    frame: DataFrame,
    labels: Vec<String>,
    groups: Vec<String>,
}

impl Pipeline {
    /// Create a new builder for `Pipeline`.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Get the pipeline configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn progress(&self, stage: TrainingStage, message: impl Into<String>) {
        let message = message.into();
        debug!("[{}] {}", stage, message);
        if let Some(callback) = &self.progress_callback {
            callback(ProgressUpdate::new(stage, message));
        }
    }

    /// Train the treatment classifier and dosage regressor on `df`.
    ///
    /// `df` is a feature frame as built by
    /// [`build_feature_frame`](aegis_processing::build_feature_frame).
    ///
    /// # Errors
    ///
    /// - [`LearningError::ColumnNotFound`] if the label column is missing
    /// - [`LearningError::InvalidData`] if no row is labelled, there are fewer
    ///   patient groups than folds, or no configured feature column is present
    pub fn train(&self, df: &DataFrame) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let config = &self.config;
        let mut warnings = Vec::new();

        self.progress(TrainingStage::Preparing, "Selecting labelled rows");
        let prepared = self.prepare(df)?;
        let n_labelled = prepared.frame.height();
        let n_groups = prepared.groups.iter().collect::<HashSet<_>>().len();
        info!(
            "Training on {} labelled rows of {} ({} patient groups)",
            n_labelled,
            df.height(),
            n_groups
        );

        self.progress(
            TrainingStage::Splitting,
            format!("Holding out 1 of {} group folds", config.n_splits),
        );
        let fold = group_split(&prepared.groups, config.n_splits)?;
        let train_df = select_rows(&prepared.frame, &fold.train)?;
        let test_df = select_rows(&prepared.frame, &fold.test)?;
        let y_train: Vec<String> = fold.train.iter().map(|&i| prepared.labels[i].clone()).collect();
        let y_test: Vec<String> = fold.test.iter().map(|&i| prepared.labels[i].clone()).collect();
        debug!("Split: {} train rows, {} test rows", y_train.len(), y_test.len());

        self.progress(TrainingStage::Preprocessing, "Fitting column preprocessing");
        let preprocessor = self.preprocessor(&prepared.frame).fit(&train_df)?;
        let x_train = preprocessor.transform(&train_df)?;
        let x_test = preprocessor.transform(&test_df)?;

        self.progress(
            TrainingStage::TrainingClassifier,
            format!("Growing {} treatment trees", config.n_estimators),
        );
        let params = ForestParams::from(config);
        let mut classifier = RandomForestClassifier::new(params, config.class_weight);
        classifier.fit(&x_train, &y_train)?;
        if classifier.classes().len() < 2 {
            let msg = "Training rows contain a single treatment; every prediction will be it";
            warn!("{}", msg);
            warnings.push(msg.to_string());
        }

        let dosage = if config.train_dosage_model {
            self.progress(
                TrainingStage::TrainingRegressor,
                format!("Growing {} dosage trees", config.n_estimators),
            );
            self.fit_dosage(&train_df, &x_train, params, &mut warnings)?
        } else {
            None
        };

        self.progress(TrainingStage::Evaluating, "Scoring held-out patients");
        let y_pred = classifier.predict(&x_test)?;
        let classification = ClassificationReport::compute(&y_test, &y_pred)?;

        let (dosage_mae, n_dosage_test) = match &dosage {
            Some(regressor) => self.score_dosage(&test_df, &x_test, regressor)?,
            None => (None, 0),
        };

        let feature_names = preprocessor.feature_names();
        let model = TreatmentModel::new(preprocessor, classifier, dosage);
        let report = TrainingReport {
            n_rows: df.height(),
            n_labelled,
            n_groups,
            n_train: fold.train.len(),
            n_test: fold.test.len(),
            feature_names,
            classification,
            dosage_mae,
            n_dosage_test,
            feature_importance: model.feature_importance(),
            training_time_seconds: start.elapsed().as_secs_f64(),
            warnings,
        };

        info!(
            "Training complete in {:.2}s: accuracy {:.3}, dosage MAE {}",
            report.training_time_seconds,
            report.classification.accuracy,
            report
                .dosage_mae
                .map_or_else(|| "n/a".to_string(), |mae| format!("{:.2}", mae))
        );
        self.progress(TrainingStage::Complete, "Training complete");

        Ok(TrainingOutcome { report, model })
    }

    fn prepare(&self, df: &DataFrame) -> Result<Prepared> {
        let config = &self.config;
        if !has_column(df, &config.label_column) {
            return Err(LearningError::ColumnNotFound(config.label_column.clone()));
        }

        let labels = column_labels(df, &config.label_column)?;
        let keep: Vec<bool> = labels.iter().map(Option::is_some).collect();
        let frame = df.filter(&BooleanChunked::from_slice("labelled".into(), &keep))?;
        let labels: Vec<String> = labels.into_iter().flatten().collect();

        let dropped = df.height() - frame.height();
        if dropped > 0 {
            debug!("Dropped {} rows without a '{}' label", dropped, config.label_column);
        }
        if labels.is_empty() {
            return Err(LearningError::InvalidData(format!(
                "No rows have a '{}' label",
                config.label_column
            )));
        }

        let groups = resolve_groups(&frame, &config.group_column)?;
        Ok(Prepared {
            frame,
            labels,
            groups,
        })
    }

    /// Configured columns plus, when enabled, every variant column of `df`.
    fn preprocessor(&self, df: &DataFrame) -> ColumnPreprocessor {
        let config = &self.config;
        let mut categorical = config.categorical_columns.clone();
        if config.include_variant_columns {
            categorical.extend(
                df.get_column_names()
                    .iter()
                    .map(|c| c.as_str())
                    .filter(|c| is_variant_column(c) && !categorical.iter().any(|k| k == c))
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            );
        }
        ColumnPreprocessor::new(
            config.numeric_columns.clone(),
            categorical,
            config.missing_sentinel.clone(),
        )
    }

    fn fit_dosage(
        &self,
        train_df: &DataFrame,
        x_train: &[Vec<f64>],
        params: ForestParams,
        warnings: &mut Vec<String>,
    ) -> Result<Option<RandomForestRegressor>> {
        let column = &self.config.dosage_column;
        if !has_column(train_df, column) {
            let msg = format!("Dosage column '{}' not found; dosage model skipped", column);
            warn!("{}", msg);
            warnings.push(msg);
            return Ok(None);
        }

        let (x, y) = rows_with_target(x_train, &column_f64(train_df, column)?);
        if y.is_empty() {
            let msg = "No training rows have a dosage; dosage model skipped".to_string();
            warn!("{}", msg);
            warnings.push(msg);
            return Ok(None);
        }

        debug!("Fitting dosage model on {} of {} rows", y.len(), x_train.len());
        let mut regressor = RandomForestRegressor::new(params);
        regressor.fit(&x, &y)?;
        Ok(Some(regressor))
    }

    fn score_dosage(
        &self,
        test_df: &DataFrame,
        x_test: &[Vec<f64>],
        regressor: &RandomForestRegressor,
    ) -> Result<(Option<f64>, usize)> {
        let (x, y) = rows_with_target(x_test, &column_f64(test_df, &self.config.dosage_column)?);
        if y.is_empty() {
            debug!("No held-out rows have a dosage; MAE not computed");
            return Ok((None, 0));
        }
        let pred = regressor.predict(&x)?;
        Ok((Some(mean_absolute_error(&y, &pred)?), y.len()))
    }
}

/// Group key per row; rows without one get `row-<i>`.
fn resolve_groups(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    if !has_column(df, column) {
        debug!("No '{}' column; each row is its own group", column);
        return Ok((0..df.height()).map(|i| format!("row-{}", i)).collect());
    }
    Ok(column_labels(df, column)?
        .into_iter()
        .enumerate()
        .map(|(i, id)| id.unwrap_or_else(|| format!("row-{}", i)))
        .collect())
}

/// Rows of `df` at the ascending indices `rows`.
fn select_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let mut keep = vec![false; df.height()];
    for &row in rows {
        keep[row] = true;
    }
    Ok(df.filter(&BooleanChunked::from_slice("fold".into(), &keep))?)
}

/// Feature rows whose target is present and finite, with those targets.
fn rows_with_target(x: &[Vec<f64>], target: &[Option<f64>]) -> (Vec<Vec<f64>>, Vec<f64>) {
    x.iter()
        .zip(target)
        .filter_map(|(row, y)| match y {
            Some(v) if v.is_finite() => Some((row.clone(), *v)),
            _ => None,
        })
        .unzip()
}

/// Builder for [`Pipeline`].
///
/// # Required Configuration
///
/// - [`config()`](Self::config): training configuration
///
/// # Optional Configuration
///
/// - [`on_progress()`](Self::on_progress): progress callback
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<TrainingConfig>,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PipelineBuilder {
    /// Set the training configuration (required).
    #[must_use]
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the progress callback (optional).
    ///
    /// The callback runs on the training thread and should return quickly.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if no configuration was
    /// provided or it fails [`TrainingConfig::validate`].
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.ok_or_else(|| {
            LearningError::InvalidConfig("Pipeline config is required".to_string())
        })?;
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_callback: self.progress_callback,
        })
    }
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);
