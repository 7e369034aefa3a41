//! Column preprocessing for the tree ensembles.
//!
//! Numeric columns are median-imputed and standardized; categorical columns
//! are filled with a sentinel and one-hot encoded. Statistics are learned on
//! the training rows only and reused unchanged at inference, where unseen
//! categories encode as all zeros.

use std::collections::BTreeSet;

use aegis_processing::features::is_variant_column;
use aegis_processing::utils::{column_f64, column_labels, has_column, median};
use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LearningError, Result};

/// Unfitted preprocessing plan.
#[derive(Debug, Clone)]
pub struct ColumnPreprocessor {
    numeric: Vec<String>,
    categorical: Vec<String>,
    sentinel: String,
}

/// Learned statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub name: String,
    /// Fill value for nulls.
    pub median: f64,
    pub mean: f64,
    /// Standard deviation, or 1 for constant columns.
    pub scale: f64,
}

impl NumericStats {
    fn encode(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.median) - self.mean) / self.scale
    }
}

/// Learned categories of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalLevels {
    pub name: String,
    /// Sorted categories; one output column each.
    pub categories: Vec<String>,
}

/// Preprocessing with statistics learned from a training frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    numeric: Vec<NumericStats>,
    categorical: Vec<CategoricalLevels>,
    sentinel: String,
}

impl ColumnPreprocessor {
    pub fn new<N, C, S>(numeric: N, categorical: C, sentinel: impl Into<String>) -> Self
    where
        N: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numeric: numeric.into_iter().map(Into::into).collect(),
            categorical: categorical.into_iter().map(Into::into).collect(),
            sentinel: sentinel.into(),
        }
    }

    /// Learn medians, means, scales and categories from `df`.
    ///
    /// Listed columns that `df` lacks are skipped; columns `df` has but that
    /// are not listed are ignored.
    pub fn fit(&self, df: &DataFrame) -> Result<FittedPreprocessor> {
        let mut numeric = Vec::new();
        for name in &self.numeric {
            if !has_column(df, name) {
                debug!("Skipping numeric column '{}': not in frame", name);
                continue;
            }
            let values = column_f64(df, name)?;
            let fill = median(&values).unwrap_or_else(|| {
                warn!("Numeric column '{}' has no values; imputing 0", name);
                0.0
            });
            let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill)).collect();
            let (mean, std) = mean_std(&imputed);
            numeric.push(NumericStats {
                name: name.clone(),
                median: fill,
                mean,
                scale: if std > 0.0 { std } else { 1.0 },
            });
        }

        let mut categorical = Vec::new();
        for name in &self.categorical {
            if !has_column(df, name) {
                debug!("Skipping categorical column '{}': not in frame", name);
                continue;
            }
            let categories: BTreeSet<String> = column_labels(df, name)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| self.sentinel.clone()))
                .collect();
            categorical.push(CategoricalLevels {
                name: name.clone(),
                categories: categories.into_iter().collect(),
            });
        }

        if numeric.is_empty() && categorical.is_empty() {
            return Err(LearningError::InvalidData(
                "None of the configured feature columns are present".to_string(),
            ));
        }

        let fitted = FittedPreprocessor {
            numeric,
            categorical,
            sentinel: self.sentinel.clone(),
        };
        debug!("Fitted preprocessor with {} output features", fitted.n_features());
        Ok(fitted)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

impl FittedPreprocessor {
    /// Width of a transformed row.
    pub fn n_features(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Output column names: numeric names, then `<column>_<category>`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|n| n.name.clone()).collect();
        for col in &self.categorical {
            names.extend(col.categories.iter().map(|c| format!("{}_{}", col.name, c)));
        }
        names
    }

    pub fn numeric_stats(&self) -> &[NumericStats] {
        &self.numeric
    }

    pub fn categorical_levels(&self) -> &[CategoricalLevels] {
        &self.categorical
    }

    /// Transform `df` into row-major feature vectors.
    ///
    /// # Errors
    ///
    /// [`LearningError::ColumnNotFound`] if a fitted column is missing.
    pub fn transform(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>> {
        let n_rows = df.height();
        let mut rows = vec![Vec::with_capacity(self.n_features()); n_rows];

        for stats in &self.numeric {
            let values = self.read(df, &stats.name, column_f64)?;
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(stats.encode(value));
            }
        }

        for levels in &self.categorical {
            let values = self.read(df, &levels.name, column_labels)?;
            for (row, value) in rows.iter_mut().zip(values) {
                let value = value.unwrap_or_else(|| self.sentinel.clone());
                let hit = levels.categories.binary_search(&value).ok();
                row.extend((0..levels.categories.len()).map(|i| {
                    if Some(i) == hit { 1.0 } else { 0.0 }
                }));
            }
        }

        Ok(rows)
    }

    /// Add every fitted column `df` lacks: numeric and categorical columns
    /// as nulls, variant presence columns as 0.
    pub fn align(&self, mut df: DataFrame) -> Result<DataFrame> {
        let height = df.height();
        for stats in &self.numeric {
            if !has_column(&df, &stats.name) {
                df.with_column(Column::new(
                    stats.name.as_str().into(),
                    vec![None::<f64>; height],
                ))?;
            }
        }
        for levels in &self.categorical {
            if has_column(&df, &levels.name) {
                continue;
            }
            let column = if is_variant_column(&levels.name) {
                Column::new(levels.name.as_str().into(), vec![0i32; height])
            } else {
                Column::new(levels.name.as_str().into(), vec![None::<&str>; height])
            };
            df.with_column(column)?;
        }
        Ok(df)
    }

    fn read<T>(
        &self,
        df: &DataFrame,
        name: &str,
        reader: impl Fn(&DataFrame, &str) -> polars::prelude::PolarsResult<Vec<T>>,
    ) -> Result<Vec<T>> {
        if !has_column(df, name) {
            return Err(LearningError::ColumnNotFound(name.to_string()));
        }
        Ok(reader(df, name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn train_df() -> DataFrame {
        df![
            "age" => [Some(20.0), Some(40.0), None, Some(60.0)],
            "const" => [5.0, 5.0, 5.0, 5.0],
            "gender" => [Some("Male"), Some("Female"), None, Some("Male")],
            "var__X" => [1i32, 0, 0, 1],
            "ignored" => [1.0, 2.0, 3.0, 4.0],
        ]
        .unwrap()
    }

    fn preprocessor() -> ColumnPreprocessor {
        ColumnPreprocessor::new(
            ["age", "const", "absent"],
            ["gender", "var__X"],
            "missing",
        )
    }

    #[test]
    fn test_fit_learns_statistics() {
        let fitted = preprocessor().fit(&train_df()).unwrap();
        let age = &fitted.numeric_stats()[0];
        assert_eq!(age.median, 40.0);
        assert_eq!(age.mean, 40.0);
        assert!((age.scale - 200f64.sqrt()).abs() < 1e-9);

        let constant = &fitted.numeric_stats()[1];
        assert_eq!(constant.scale, 1.0);
        assert_eq!(fitted.numeric_stats().len(), 2);

        assert_eq!(
            fitted.categorical_levels()[0].categories,
            vec!["Female", "Male", "missing"]
        );
        assert_eq!(fitted.categorical_levels()[1].categories, vec!["0", "1"]);
    }

    #[test]
    fn test_feature_names() {
        let fitted = preprocessor().fit(&train_df()).unwrap();
        assert_eq!(
            fitted.feature_names(),
            vec![
                "age",
                "const",
                "gender_Female",
                "gender_Male",
                "gender_missing",
                "var__X_0",
                "var__X_1"
            ]
        );
        assert_eq!(fitted.n_features(), 7);
    }

    #[test]
    fn test_transform_imputes_and_encodes() {
        let fitted = preprocessor().fit(&train_df()).unwrap();
        let rows = fitted.transform(&train_df()).unwrap();
        assert_eq!(rows.len(), 4);
        // null age is imputed with the median, which equals the mean
        assert_eq!(rows[2][0], 0.0);
        assert_eq!(rows[2][1], 0.0);
        assert_eq!(&rows[2][2..], &[0.0, 0.0, 1.0, 1.0, 0.0]);
        assert_eq!(&rows[0][2..], &[0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unknown_category_is_all_zeros() {
        let fitted = preprocessor().fit(&train_df()).unwrap();
        let test = df![
            "age" => [30.0],
            "const" => [5.0],
            "gender" => ["Other"],
            "var__X" => [1i32],
        ]
        .unwrap();
        let rows = fitted.transform(&test).unwrap();
        assert_eq!(&rows[0][2..5], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_missing_column() {
        let fitted = preprocessor().fit(&train_df()).unwrap();
        let test = df!["age" => [30.0]].unwrap();
        let err = fitted.transform(&test).unwrap_err();
        assert!(matches!(err, LearningError::ColumnNotFound(ref c) if c == "const"));
    }

    #[test]
    fn test_align_fills_missing_columns() {
        let fitted = preprocessor().fit(&train_df()).unwrap();
        let sparse = df!["age" => [50.0, 20.0]].unwrap();
        let aligned = fitted.align(sparse).unwrap();

        assert_eq!(column_f64(&aligned, "var__X").unwrap(), vec![Some(0.0), Some(0.0)]);
        assert_eq!(column_labels(&aligned, "gender").unwrap(), vec![None, None]);
        let rows = fitted.transform(&aligned).unwrap();
        // null gender becomes the sentinel, absent variant the "0" level
        assert_eq!(&rows[0][2..], &[0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_fit_without_any_listed_column() {
        let err = ColumnPreprocessor::new(["nope"], ["nada"], "missing")
            .fit(&train_df())
            .unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
    }

    #[test]
    fn test_non_finite_values_are_imputed() {
        let df = df!["bmi" => [f64::INFINITY, 20.0, 22.0, 24.0, 26.0]].unwrap();
        let fitted = ColumnPreprocessor::new(["bmi"], Vec::<&str>::new(), "missing")
            .fit(&df)
            .unwrap();
        let stats = &fitted.numeric_stats()[0];
        assert_eq!(stats.median, 23.0);
        assert_eq!(stats.mean, 23.0);

        let rows = fitted.transform(&df).unwrap();
        assert!(rows.iter().all(|row| row[0].is_finite()));
        assert!(rows[0][0].abs() < 1e-12);
    }

    #[test]
    fn test_all_null_numeric_falls_back_to_zero() {
        let df = df!["age" => [None::<f64>, None]].unwrap();
        let fitted = ColumnPreprocessor::new(["age"], Vec::<&str>::new(), "missing")
            .fit(&df)
            .unwrap();
        assert_eq!(fitted.numeric_stats()[0].median, 0.0);
        assert_eq!(fitted.transform(&df).unwrap(), vec![vec![0.0], vec![0.0]]);
    }
}
