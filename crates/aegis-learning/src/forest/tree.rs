//! CART decision tree over dense `f64` feature rows.
//!
//! Splits are chosen by weighted impurity decrease (Gini for classification,
//! squared error for regression) over midpoint thresholds between distinct
//! sorted feature values. Candidate features are shuffled per node and the
//! first `max_features` are tried.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const IMPURITY_EPSILON: f64 = 1e-12;

/// What a tree predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Targets are class indices `0..n_classes` stored as `f64`.
    Classification { n_classes: usize },
    Regression,
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per node.
    pub max_features: usize,
}

/// A fitted tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// Class distribution, or a single mean for regression.
    Leaf { value: Vec<f64> },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Borrowed training data shared by every node of one fit.
struct Samples<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    weight: &'a [f64],
}

/// Weighted running statistics of a node's targets.
#[derive(Debug, Clone)]
struct Accumulator {
    weight: f64,
    class_weight: Vec<f64>,
    sum: f64,
    sum_sq: f64,
}

impl Accumulator {
    fn new(task: Task) -> Self {
        let n_classes = match task {
            Task::Classification { n_classes } => n_classes,
            Task::Regression => 0,
        };
        Self {
            weight: 0.0,
            class_weight: vec![0.0; n_classes],
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    fn add(&mut self, y: f64, w: f64) {
        self.weight += w;
        if let Some(slot) = self.class_weight.get_mut(y as usize) {
            *slot += w;
        }
        self.sum += w * y;
        self.sum_sq += w * y * y;
    }

    fn remove(&mut self, y: f64, w: f64) {
        self.add(y, -w);
    }

    fn impurity(&self, task: Task) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        match task {
            Task::Classification { .. } => {
                let sq: f64 = self
                    .class_weight
                    .iter()
                    .map(|c| (c / self.weight).powi(2))
                    .sum();
                1.0 - sq
            }
            Task::Regression => {
                let mean = self.sum / self.weight;
                (self.sum_sq / self.weight - mean * mean).max(0.0)
            }
        }
    }

    fn leaf_value(&self, task: Task) -> Vec<f64> {
        match task {
            Task::Classification { .. } if self.weight > 0.0 => {
                self.class_weight.iter().map(|c| c / self.weight).collect()
            }
            Task::Classification { .. } => self.class_weight.clone(),
            Task::Regression if self.weight > 0.0 => vec![self.sum / self.weight],
            Task::Regression => vec![0.0],
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    task: Task,
    params: TreeParams,
    root: Option<Node>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(task: Task, params: TreeParams) -> Self {
        Self {
            task,
            params,
            root: None,
            feature_importances: Vec::new(),
        }
    }

    /// Fit on the rows listed in `indices` (repeats allowed).
    ///
    /// Callers guarantee every row of `x` has the same width and that
    /// `y` and `weight` are as long as `x`.
    pub fn fit<R: Rng>(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        weight: &[f64],
        indices: Vec<usize>,
        rng: &mut R,
    ) {
        let n_features = x.first().map_or(0, Vec::len);
        self.feature_importances = vec![0.0; n_features];
        let samples = Samples { x, y, weight };

        let root = self.grow(&samples, indices, 0, rng);
        self.root = Some(root);

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }
    }

    fn accumulate(&self, samples: &Samples<'_>, indices: &[usize]) -> Accumulator {
        let mut acc = Accumulator::new(self.task);
        for &i in indices {
            acc.add(samples.y[i], samples.weight[i]);
        }
        acc
    }

    fn grow<R: Rng>(
        &mut self,
        samples: &Samples<'_>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut R,
    ) -> Node {
        let node = self.accumulate(samples, &indices);
        let impurity = node.impurity(self.task);
        let n = indices.len();

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || impurity <= IMPURITY_EPSILON
        {
            return Node::Leaf {
                value: node.leaf_value(self.task),
            };
        }

        let Some(best) = self.find_best_split(samples, &indices, &node, impurity, rng) else {
            return Node::Leaf {
                value: node.leaf_value(self.task),
            };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| samples.x[i][best.feature] <= best.threshold);
        if left.is_empty() || right.is_empty() {
            return Node::Leaf {
                value: node.leaf_value(self.task),
            };
        }

        self.feature_importances[best.feature] += best.gain * node.weight;

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(samples, left, depth + 1, rng)),
            right: Box::new(self.grow(samples, right, depth + 1, rng)),
        }
    }

    fn find_best_split<R: Rng>(
        &self,
        samples: &Samples<'_>,
        indices: &[usize],
        parent: &Accumulator,
        parent_impurity: f64,
        rng: &mut R,
    ) -> Option<BestSplit> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;

        let mut features: Vec<usize> = (0..self.feature_importances.len()).collect();
        features.shuffle(rng);
        features.truncate(self.params.max_features.max(1));

        let mut best: Option<BestSplit> = None;
        let mut order = indices.to_vec();

        for feature in features {
            let value = |i: usize| samples.x[i][feature];
            order.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

            let mut left = Accumulator::new(self.task);
            let mut right = parent.clone();

            for pos in 0..n - 1 {
                let i = order[pos];
                left.add(samples.y[i], samples.weight[i]);
                right.remove(samples.y[i], samples.weight[i]);

                let (here, next) = (value(i), value(order[pos + 1]));
                if here.is_nan() || next.is_nan() || here >= next {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }
                if left.weight <= 0.0 || right.weight <= 0.0 {
                    continue;
                }

                let child = (left.weight * left.impurity(self.task)
                    + right.weight * right.impurity(self.task))
                    / parent.weight;
                let gain = parent_impurity - child;

                if gain > IMPURITY_EPSILON && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: midpoint(here, next),
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Leaf value for one row: class distribution, or `[mean]`.
    pub fn predict_row(&self, row: &[f64]) -> &[f64] {
        let mut node = match &self.root {
            Some(root) => root,
            None => return &[],
        };
        loop {
            match node {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if x <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    /// Normalized impurity decrease per feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}

/// Threshold between two sorted distinct values that keeps `here` left and
/// `next` right. Falls back to `here` when the midpoint rounds onto `next`
/// or overflows.
fn midpoint(here: f64, next: f64) -> f64 {
    let mid = here / 2.0 + next / 2.0;
    if mid.is_finite() && here <= mid && mid < next {
        mid
    } else {
        here
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(max_features: usize) -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
        }
    }

    fn fit(task: Task, x: &[Vec<f64>], y: &[f64], weight: &[f64]) -> DecisionTree {
        let n_features = x[0].len();
        let mut tree = DecisionTree::new(task, params(n_features));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        tree.fit(x, y, weight, (0..x.len()).collect(), &mut rng);
        tree
    }

    #[test]
    fn test_classification_separates_classes() {
        let x = vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![8.0, 0.0], vec![9.0, 0.0]];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        let tree = fit(Task::Classification { n_classes: 2 }, &x, &y, &[1.0; 4]);

        assert_eq!(tree.predict_row(&[1.5, 0.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_row(&[8.5, 0.0]), &[0.0, 1.0]);
        assert_eq!(tree.feature_importances(), &[1.0, 0.0]);

        let Some(Node::Split { threshold, .. }) = tree.root() else {
            panic!("root should split");
        };
        assert_eq!(*threshold, 5.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let tree = fit(Task::Classification { n_classes: 2 }, &x, &[1.0; 3], &[1.0; 3]);
        let root = tree.root().unwrap();
        assert_eq!(root.n_leaves(), 1);
        assert_eq!(tree.predict_row(&[10.0]), &[0.0, 1.0]);
    }

    #[test]
    fn test_regression_predicts_leaf_means() {
        let x = vec![vec![1.0], vec![2.0], vec![10.0], vec![11.0]];
        let y = vec![5.0, 5.0, 20.0, 20.0];
        let tree = fit(Task::Regression, &x, &y, &[1.0; 4]);
        assert_eq!(tree.predict_row(&[0.0]), &[5.0]);
        assert_eq!(tree.predict_row(&[12.0]), &[20.0]);
    }

    #[test]
    fn test_weights_shift_leaf_distribution() {
        let x = vec![vec![0.0], vec![0.0], vec![0.0]];
        let y = vec![0.0, 0.0, 1.0];
        let tree = fit(
            Task::Classification { n_classes: 2 },
            &x,
            &y,
            &[1.0, 1.0, 2.0],
        );
        // identical rows cannot be split; the leaf keeps weighted fractions
        assert_eq!(tree.predict_row(&[0.0]), &[0.5, 0.5]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..16).map(|i| (i % 4) as f64).collect();
        let mut tree = DecisionTree::new(
            Task::Classification { n_classes: 4 },
            TreeParams {
                max_depth: Some(2),
                ..params(1)
            },
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        tree.fit(&x, &y, &[1.0; 16], (0..16).collect(), &mut rng);
        assert!(tree.root().unwrap().depth() <= 3);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let y = vec![0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(
            Task::Classification { n_classes: 2 },
            TreeParams {
                min_samples_leaf: 2,
                ..params(1)
            },
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        tree.fit(&x, &y, &[1.0; 4], (0..4).collect(), &mut rng);
        assert_eq!(tree.predict_row(&[1.0]), &[0.5, 0.5]);
    }

    #[test]
    fn test_non_finite_values_still_terminate() {
        let x = vec![
            vec![f64::NEG_INFINITY],
            vec![f64::NEG_INFINITY],
            vec![1.0],
            vec![f64::NAN],
        ];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        let tree = fit(Task::Classification { n_classes: 2 }, &x, &y, &[1.0; 4]);

        let root = tree.root().unwrap();
        assert_eq!(root.n_leaves(), 2);
        assert_eq!(tree.predict_row(&[f64::NEG_INFINITY]), &[1.0, 0.0]);
        assert_eq!(tree.predict_row(&[1.0]), &[0.0, 1.0]);
    }

    #[test]
    fn test_adjacent_floats_split_apart() {
        let next = 1.0f64.next_up();
        let threshold = midpoint(1.0, next);
        assert!(1.0 <= threshold && threshold < next);
        assert_eq!(midpoint(f64::NEG_INFINITY, 0.0), f64::NEG_INFINITY);
        assert_eq!(midpoint(f64::MAX, f64::INFINITY), f64::MAX);

        let x = vec![vec![1.0], vec![next]];
        let tree = fit(Task::Regression, &x, &[0.0, 10.0], &[1.0; 2]);
        assert_eq!(tree.predict_row(&[1.0]), &[0.0]);
        assert_eq!(tree.predict_row(&[next]), &[10.0]);
    }

    #[test]
    fn test_unfitted_tree_predicts_nothing() {
        let tree = DecisionTree::new(Task::Regression, params(1));
        assert!(!tree.is_fitted());
        assert!(tree.predict_row(&[1.0]).is_empty());
    }
}
