//! Random-forest ensembles.
//!
//! Each tree is fitted on a bootstrap sample drawn with its own
//! `ChaCha8Rng` seeded from `seed + tree_index`, so a forest is reproducible
//! for a given seed even though trees are grown in parallel with `rayon`.

pub mod tree;

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use tree::{DecisionTree, Node, Task, TreeParams};

use crate::config::{ClassWeight, TrainingConfig};
use crate::error::{LearningError, Result};

/// Hyperparameters shared by both ensembles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl From<&TrainingConfig> for ForestParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            seed: config.random_seed,
        }
    }
}

impl ForestParams {
    fn tree_params(&self, max_features: usize) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features,
        }
    }
}

/// Check that `x` is non-empty and rectangular; returns its width.
fn matrix_width(x: &[Vec<f64>], n_targets: usize) -> Result<usize> {
    let Some(first) = x.first() else {
        return Err(LearningError::InvalidData(
            "Cannot fit on zero rows".to_string(),
        ));
    };
    if x.len() != n_targets {
        return Err(LearningError::InvalidData(format!(
            "{} feature rows but {} targets",
            x.len(),
            n_targets
        )));
    }
    let width = first.len();
    if let Some(pos) = x.iter().position(|row| row.len() != width) {
        return Err(LearningError::InvalidData(format!(
            "Row {} has {} features, expected {}",
            pos,
            x[pos].len(),
            width
        )));
    }
    Ok(width)
}

fn check_inference(x: &[Vec<f64>], n_features: usize, fitted: bool) -> Result<()> {
    if !fitted {
        return Err(LearningError::InferenceError(
            "Model has not been fitted".to_string(),
        ));
    }
    if let Some(row) = x.iter().find(|row| row.len() != n_features) {
        return Err(LearningError::InferenceError(format!(
            "Expected {} features, got {}",
            n_features,
            row.len()
        )));
    }
    Ok(())
}

/// Grow `params.n_estimators` bootstrap trees in parallel and return them
/// with their averaged, normalized feature importances.
fn grow_forest(
    params: &ForestParams,
    task: Task,
    max_features: usize,
    x: &[Vec<f64>],
    y: &[f64],
    weight: &[f64],
) -> (Vec<DecisionTree>, Vec<f64>) {
    let n = x.len();
    let n_features = x.first().map_or(0, Vec::len);
    let tree_params = params.tree_params(max_features);

    let trees: Vec<DecisionTree> = (0..params.n_estimators)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut tree = DecisionTree::new(task, tree_params);
            tree.fit(x, y, weight, bootstrap, &mut rng);
            tree
        })
        .collect();

    let mut importances = vec![0.0; n_features];
    for tree in &trees {
        for (acc, imp) in importances.iter_mut().zip(tree.feature_importances()) {
            *acc += imp;
        }
    }
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for imp in &mut importances {
            *imp /= total;
        }
    }

    (trees, importances)
}

// ============================================================================
// Classifier
// ============================================================================

/// Random-forest classifier over string labels.
///
/// Classes are sorted; probabilities are the mean of the trees' leaf
/// distributions and ties in [`predict`](Self::predict) go to the first class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    class_weight: ClassWeight,
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn new(params: ForestParams, class_weight: ClassWeight) -> Self {
        Self {
            params,
            class_weight,
            classes: Vec::new(),
            n_features: 0,
            trees: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    /// Fit on row-major features `x` and labels `y`.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[String]) -> Result<()> {
        let n_features = matrix_width(x, y.len())?;

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in y {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        let classes: Vec<String> = counts.keys().map(|c| c.to_string()).collect();
        let index: BTreeMap<&str, usize> = counts
            .keys()
            .enumerate()
            .map(|(i, c)| (*c, i))
            .collect();

        let targets: Vec<f64> = y.iter().map(|l| index[l.as_str()] as f64).collect();
        let weights: Vec<f64> = match self.class_weight {
            ClassWeight::Uniform => vec![1.0; y.len()],
            ClassWeight::Balanced => {
                let n = y.len() as f64;
                let k = classes.len() as f64;
                y.iter()
                    .map(|l| n / (k * counts[l.as_str()] as f64))
                    .collect()
            }
        };

        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        debug!(
            "Fitting classifier: {} rows, {} features, {} classes, {} trees",
            x.len(),
            n_features,
            classes.len(),
            self.params.n_estimators
        );

        let task = Task::Classification {
            n_classes: classes.len(),
        };
        let (trees, importances) =
            grow_forest(&self.params, task, max_features, x, &targets, &weights);

        self.classes = classes;
        self.n_features = n_features;
        self.trees = trees;
        self.feature_importances = importances;
        Ok(())
    }

    /// Class probabilities per row, columns ordered as [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_inference(x, self.n_features, !self.trees.is_empty())?;
        let n_trees = self.trees.len() as f64;
        Ok(x.par_iter()
            .map(|row| {
                let mut proba = vec![0.0; self.classes.len()];
                for tree in &self.trees {
                    for (p, v) in proba.iter_mut().zip(tree.predict_row(row)) {
                        *p += v;
                    }
                }
                proba.iter_mut().for_each(|p| *p /= n_trees);
                proba
            })
            .collect())
    }

    /// Most probable class per row.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<String>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .iter()
            .map(|p| self.classes[argmax(p)].clone())
            .collect())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Index of the first maximum.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

// ============================================================================
// Regressor
// ============================================================================

/// Random-forest regressor; predictions are the mean over trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: 0,
            trees: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let n_features = matrix_width(x, y.len())?;
        if let Some(pos) = y.iter().position(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(format!(
                "Target at row {} is not finite",
                pos
            )));
        }

        debug!(
            "Fitting regressor: {} rows, {} features, {} trees",
            x.len(),
            n_features,
            self.params.n_estimators
        );
        let weights = vec![1.0; y.len()];
        let (trees, importances) =
            grow_forest(&self.params, Task::Regression, n_features, x, y, &weights);

        self.n_features = n_features;
        self.trees = trees;
        self.feature_importances = importances;
        Ok(())
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_inference(x, self.n_features, !self.trees.is_empty())?;
        let n_trees = self.trees.len() as f64;
        Ok(x.par_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .map(|t| t.predict_row(row).first().copied().unwrap_or(0.0))
                    .sum::<f64>()
                    / n_trees
            })
            .collect())
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

static_assertions::assert_impl_all!(RandomForestClassifier: Send, Sync);
static_assertions::assert_impl_all!(RandomForestRegressor: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 25,
            ..ForestParams::default()
        }
    }

    /// Two well-separated clusters on feature 0; feature 1 is noise.
    fn clusters() -> (Vec<Vec<f64>>, Vec<String>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let noise = (i % 7) as f64;
            x.push(vec![i as f64 * 0.1, noise]);
            y.push("Metformin".to_string());
            x.push(vec![10.0 + i as f64 * 0.1, noise]);
            y.push("Insulin".to_string());
        }
        (x, y)
    }

    #[test]
    fn test_classifier_learns_clusters() {
        let (x, y) = clusters();
        let mut model = RandomForestClassifier::new(small_params(), ClassWeight::Balanced);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.classes(), &["Insulin", "Metformin"]);
        assert_eq!(model.n_trees(), 25);
        let pred = model.predict(&[vec![0.5, 3.0], vec![11.0, 3.0]]).unwrap();
        assert_eq!(pred, vec!["Metformin", "Insulin"]);

        let importances = model.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = clusters();
        let mut model = RandomForestClassifier::new(small_params(), ClassWeight::Uniform);
        model.fit(&x, &y).unwrap();
        for row in model.predict_proba(&x).unwrap() {
            assert_eq!(row.len(), 2);
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = clusters();
        let fit = || {
            let mut model = RandomForestClassifier::new(small_params(), ClassWeight::Balanced);
            model.fit(&x, &y).unwrap();
            model.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_regressor_tracks_target() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 500.0 } else { 1500.0 }).collect();
        let mut model = RandomForestRegressor::new(small_params());
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&[vec![2.0], vec![37.0]]).unwrap();
        assert!((pred[0] - 500.0).abs() < 100.0);
        assert!((pred[1] - 1500.0).abs() < 100.0);
        assert_eq!(model.feature_importances(), &[1.0]);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut model = RandomForestClassifier::new(small_params(), ClassWeight::Balanced);
        assert!(matches!(
            model.fit(&[], &[]),
            Err(LearningError::InvalidData(_))
        ));
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        let labels = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            model.fit(&ragged, &labels),
            Err(LearningError::InvalidData(_))
        ));

        let mut reg = RandomForestRegressor::new(small_params());
        let err = reg.fit(&[vec![1.0]], &[f64::NAN]).unwrap_err();
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn test_predict_before_fit_or_wrong_width() {
        let model = RandomForestRegressor::new(small_params());
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(LearningError::InferenceError(_))
        ));

        let (x, y) = clusters();
        let mut clf = RandomForestClassifier::new(small_params(), ClassWeight::Balanced);
        clf.fit(&x, &y).unwrap();
        let err = clf.predict(&[vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("Expected 2 features"));
    }

    #[test]
    fn test_argmax_prefers_first() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}
