//! Group-aware train/test splitting.
//!
//! Rows sharing a group key (a patient id) always land in the same fold.
//! Groups are assigned largest first, each to the fold that currently holds
//! the fewest rows, which keeps fold sizes close without splitting a group.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::error::{LearningError, Result};

/// Row indices of one train/test partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows into `n_splits` group folds.
///
/// Fold `i` holds out the rows of the groups assigned to it; every other row
/// is in its training set. Indices within each set are ascending.
///
/// # Errors
///
/// - [`LearningError::InvalidConfig`] if `n_splits < 2`
/// - [`LearningError::InvalidData`] if there are fewer distinct groups than splits
pub fn group_k_fold<G: Eq + Hash>(groups: &[G], n_splits: usize) -> Result<Vec<Fold>> {
    if n_splits < 2 {
        return Err(LearningError::InvalidConfig(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }

    // group id per row, ids in first-seen order
    let mut ids: HashMap<&G, usize> = HashMap::new();
    let mut sizes: Vec<usize> = Vec::new();
    let row_group: Vec<usize> = groups
        .iter()
        .map(|g| {
            let next = ids.len();
            let id = *ids.entry(g).or_insert(next);
            if id == sizes.len() {
                sizes.push(0);
            }
            sizes[id] += 1;
            id
        })
        .collect();

    let n_groups = sizes.len();
    if n_groups < n_splits {
        return Err(LearningError::InvalidData(format!(
            "Cannot have number of splits n_splits={} greater than the number of groups: {}",
            n_splits, n_groups
        )));
    }

    // largest groups first; ties keep first-seen order
    let mut order: Vec<usize> = (0..n_groups).collect();
    order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));

    let mut fold_sizes = vec![0usize; n_splits];
    let mut group_fold = vec![0usize; n_groups];
    for group in order {
        let lightest = (0..n_splits)
            .min_by_key(|&f| (fold_sizes[f], f))
            .unwrap_or(0);
        fold_sizes[lightest] += sizes[group];
        group_fold[group] = lightest;
    }

    Ok((0..n_splits)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..groups.len()).partition(|&row| group_fold[row_group[row]] == fold);
            Fold { train, test }
        })
        .collect())
}

/// The first fold of [`group_k_fold`]: a single held-out partition.
pub fn group_split<G: Eq + Hash>(groups: &[G], n_splits: usize) -> Result<Fold> {
    group_k_fold(groups, n_splits)?
        .into_iter()
        .next()
        .ok_or_else(|| LearningError::InvalidData("No folds produced".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn groups_of(fold: &Fold, groups: &[&str]) -> (HashSet<String>, HashSet<String>) {
        let train = fold.train.iter().map(|&i| groups[i].to_string()).collect();
        let test = fold.test.iter().map(|&i| groups[i].to_string()).collect();
        (train, test)
    }

    #[test]
    fn test_groups_never_straddle_partitions() {
        let groups = ["a", "a", "b", "c", "c", "c", "d", "e", "e", "f"];
        let folds = group_k_fold(&groups, 3).unwrap();
        assert_eq!(folds.len(), 3);
        for fold in &folds {
            let (train, test) = groups_of(fold, &groups);
            assert!(train.is_disjoint(&test));
            assert_eq!(fold.train.len() + fold.test.len(), groups.len());
        }
    }

    #[test]
    fn test_every_row_tested_once() {
        let groups: Vec<usize> = (0..23).map(|i| i / 2).collect();
        let folds = group_k_fold(&groups, 5).unwrap();
        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_largest_group_goes_to_first_fold() {
        // c has three rows, so it is placed first into fold 0
        let groups = ["a", "b", "c", "c", "c", "d"];
        let fold = group_split(&groups, 2).unwrap();
        assert_eq!(fold.test, vec![2, 3, 4]);
        assert_eq!(fold.train, vec![0, 1, 5]);
    }

    #[test]
    fn test_unique_ids_balance_evenly() {
        let groups: Vec<usize> = (0..200).collect();
        let folds = group_k_fold(&groups, 5).unwrap();
        for fold in folds {
            assert_eq!(fold.test.len(), 40);
        }
    }

    #[test]
    fn test_too_few_groups() {
        let err = group_k_fold(&["a", "a", "b"], 5).unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
        assert!(err.to_string().contains("number of groups: 2"));
    }

    #[test]
    fn test_n_splits_below_two() {
        let err = group_split(&[1, 2, 3], 1).unwrap_err();
        assert!(matches!(err, LearningError::InvalidConfig(_)));
    }
}
