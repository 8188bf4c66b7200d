//! Row sampling for training: train/test splitting, synthetic minority
//! oversampling and cross-validation folds.

use crate::error::{AppError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Row indices of a train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,

    /// False when some class had fewer than 2 rows and the split fell back to a plain shuffle
    pub stratified: bool,
}

/// Split rows into train/test, stratifying by `labels` when every class has at least 2 rows.
///
/// Test size is `ceil(n * test_size)` either way. The stratified split spreads
/// it over classes by largest remainder and keeps at least one training row per class.
pub fn train_test_split(labels: &[usize], test_size: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let by_class = group_by_class(labels);
    let stratify = by_class.values().all(|rows| rows.len() >= 2);

    let (mut train, mut test) = if stratify {
        let sizes: Vec<usize> = by_class.values().map(Vec::len).collect();
        let quotas = stratified_test_quotas(&sizes, test_size);

        let mut train = Vec::with_capacity(labels.len());
        let mut test = Vec::new();
        for (mut rows, n_test) in by_class.into_values().zip(quotas) {
            rows.shuffle(&mut rng);
            test.extend_from_slice(&rows[..n_test]);
            train.extend_from_slice(&rows[n_test..]);
        }
        (train, test)
    } else {
        let n = labels.len();
        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(&mut rng);
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1)
        };
        let train = rows.split_off(n_test);
        (train, rows)
    };

    train.sort_unstable();
    test.sort_unstable();
    Split {
        train,
        test,
        stratified: stratify,
    }
}

/// Per-class test counts summing to `ceil(n * test_size)`, each at most `len - 1`
fn stratified_test_quotas(sizes: &[usize], test_size: f64) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    let capacity: usize = sizes.iter().map(|len| len.saturating_sub(1)).sum();
    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, capacity.max(1));

    let exact: Vec<f64> = sizes
        .iter()
        .map(|&len| len as f64 * n_test as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = exact
        .iter()
        .zip(sizes)
        .map(|(q, &len)| (q.floor() as usize).min(len.saturating_sub(1)))
        .collect();

    // largest fractional remainder first; ties go to the lower class code
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(quotas.iter().sum());
    while remaining > 0 {
        let before = remaining;
        for &class in &order {
            if remaining == 0 {
                break;
            }
            if quotas[class] + 1 < sizes[class] {
                quotas[class] += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            break;
        }
    }
    quotas
}

/// Neighbour count used for oversampling: `min(max_k, n / n_classes - 1)`
pub fn oversampling_neighbors(labels: &[usize], max_k: usize) -> usize {
    let n_classes = group_by_class(labels).len().max(1);
    (labels.len() / n_classes).saturating_sub(1).min(max_k)
}

/// SMOTE-style oversampling: every class is brought up to the majority count by
/// interpolating between a member and one of its `k` nearest same-class neighbours.
///
/// Fails when `k` is zero or any minority class has `k` or fewer members.
pub fn oversample(
    features: &Array2<f64>,
    labels: &[usize],
    k: usize,
    seed: u64,
) -> Result<(Array2<f64>, Vec<usize>)> {
    if features.nrows() != labels.len() {
        return Err(AppError::Internal(format!(
            "{} feature rows for {} labels",
            features.nrows(),
            labels.len()
        )));
    }
    if k == 0 {
        return Err(AppError::Training(
            "oversampling needs at least one neighbour".to_string(),
        ));
    }

    let by_class = group_by_class(labels);
    let majority = by_class.values().map(Vec::len).max().unwrap_or(0);

    if let Some((class, rows)) = by_class
        .iter()
        .find(|(_, rows)| rows.len() < majority && rows.len() <= k)
    {
        return Err(AppError::Training(format!(
            "class {} has {} samples, oversampling with k_neighbors={} needs more than {}",
            class,
            rows.len(),
            k,
            k
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut synthetic: Vec<f64> = Vec::new();
    let mut synthetic_labels = Vec::new();

    for (&class, rows) in &by_class {
        let needed = majority - rows.len();
        if needed == 0 {
            continue;
        }
        let neighbors = nearest_neighbors(features, rows, k);
        for _ in 0..needed {
            let pick = rng.gen_range(0..rows.len());
            let base = features.row(rows[pick]);
            let other = features.row(neighbors[pick][rng.gen_range(0..k)]);
            let gap: f64 = rng.gen();
            synthetic.extend(
                base.iter()
                    .zip(other.iter())
                    .map(|(&a, &b)| a + gap * (b - a)),
            );
            synthetic_labels.push(class);
        }
    }

    let n_new = synthetic_labels.len();
    let extra = Array2::from_shape_vec((n_new, features.ncols()), synthetic)
        .map_err(|e| AppError::Internal(format!("Failed to build synthetic rows: {}", e)))?;
    let resampled = ndarray::concatenate(Axis(0), &[features.view(), extra.view()])
        .map_err(|e| AppError::Internal(format!("Failed to append synthetic rows: {}", e)))?;

    let mut resampled_labels = labels.to_vec();
    resampled_labels.extend(synthetic_labels);
    Ok((resampled, resampled_labels))
}

/// Stratified K-fold `(train, test)` index pairs; each class is dealt
/// round-robin across folds after a seeded shuffle.
pub fn stratified_kfold(
    labels: &[usize],
    n_splits: usize,
    seed: u64,
) -> Vec<(Vec<usize>, Vec<usize>)> {
    let n_splits = n_splits.max(2);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
    let mut next = 0usize;

    for mut rows in group_by_class(labels).into_values() {
        rows.shuffle(&mut rng);
        for row in rows {
            folds[next % n_splits].push(row);
            next += 1;
        }
    }

    (0..n_splits)
        .map(|i| {
            let mut test = folds[i].clone();
            test.sort_unstable();
            let mut train: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();
            train.sort_unstable();
            (train, test)
        })
        .collect()
}

/// Rows of `features` selected by `rows`, in order
pub fn select_rows(features: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    features.select(Axis(0), rows)
}

fn group_by_class(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }
    by_class
}

/// For each member of `rows`, the `k` nearest other members (row indices)
fn nearest_neighbors(features: &Array2<f64>, rows: &[usize], k: usize) -> Vec<Vec<usize>> {
    rows.iter()
        .map(|&row| {
            let here = features.row(row);
            let mut others: Vec<(f64, usize)> = rows
                .iter()
                .filter(|&&other| other != row)
                .map(|&other| (squared_distance(here, features.row(other)), other))
                .collect();
            others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            others.into_iter().take(k).map(|(_, other)| other).collect()
        })
        .collect()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(counts: &[(usize, usize)]) -> Vec<usize> {
        counts.iter()
            .flat_map(|&(class, n)| std::iter::repeat(class).take(n))
            .collect()
    }

    #[test]
    fn test_stratified_split_keeps_every_class_on_both_sides() {
        let y = labels(&[(0, 10), (1, 5), (2, 5)]);
        let split = train_test_split(&y, 0.2, 42);

        assert!(split.stratified);
        assert_eq!(split.train.len() + split.test.len(), y.len());
        for class in 0..3 {
            assert!(split.test.iter().any(|&i| y[i] == class));
            assert!(split.train.iter().any(|&i| y[i] == class));
        }
        assert_eq!(split.test.iter().filter(|&&i| y[i] == 0).count(), 2);
    }

    #[test]
    fn test_stratified_split_honours_test_size() {
        let y = labels(&[(0, 8), (1, 8), (2, 8)]);
        let split = train_test_split(&y, 0.2, 42);

        assert!(split.stratified);
        assert_eq!(split.test.len(), 5); // ceil(24 * 0.2)
        assert_eq!(split.train.len(), 19);
    }

    #[test]
    fn test_stratified_split_with_many_small_classes() {
        let counts: Vec<(usize, usize)> = (0..40).map(|class| (class, 2)).collect();
        let y = labels(&counts);
        let split = train_test_split(&y, 0.2, 42);

        assert!(split.stratified);
        assert_eq!(split.test.len(), 16); // ceil(80 * 0.2)
        assert_eq!(split.train.len(), 64);
        for class in 0..40 {
            assert!(split.train.iter().any(|&i| y[i] == class));
        }
    }

    #[test]
    fn test_split_degrades_with_singleton_class() {
        let y = labels(&[(0, 6), (1, 6), (2, 1)]);
        let split = train_test_split(&y, 0.2, 42);

        assert!(!split.stratified);
        assert_eq!(split.test.len(), 3); // ceil(13 * 0.2)
        assert_eq!(split.train.len(), 10);
    }

    #[test]
    fn test_split_is_seeded() {
        let y = labels(&[(0, 20), (1, 20)]);

        assert_eq!(train_test_split(&y, 0.25, 7), train_test_split(&y, 0.25, 7));
    }

    #[test]
    fn test_oversample_balances_classes() {
        let y = labels(&[(0, 8), (1, 4)]);
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i * 2 + j) as f64);

        let (xr, yr) = oversample(&x, &y, 3, 42).unwrap();

        assert_eq!(xr.nrows(), 16);
        assert_eq!(yr.iter().filter(|&&c| c == 1).count(), 8);
        // synthetic minority rows lie between minority rows
        for row in 12..16 {
            assert!(xr[[row, 0]] >= 16.0 && xr[[row, 0]] <= 22.0);
        }
    }

    #[test]
    fn test_oversample_infeasible_neighbor_count() {
        let y = labels(&[(0, 8), (1, 2)]);
        let x = Array2::zeros((10, 2));

        assert!(oversample(&x, &y, 3, 42).is_err());
        assert!(oversample(&x, &y, 0, 42).is_err());
    }

    #[test]
    fn test_oversampling_neighbors() {
        assert_eq!(oversampling_neighbors(&labels(&[(0, 30), (1, 30)]), 5), 5);
        assert_eq!(oversampling_neighbors(&labels(&[(0, 4), (1, 2)]), 5), 2);
        assert_eq!(oversampling_neighbors(&labels(&[(0, 1), (1, 1)]), 5), 0);
    }

    #[test]
    fn test_stratified_kfold_partitions_rows() {
        let y = labels(&[(0, 10), (1, 5)]);
        let folds = stratified_kfold(&y, 5, 42);

        assert_eq!(folds.len(), 5);
        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..15).collect::<Vec<_>>());
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 15);
            assert_eq!(test.len(), 3);
            assert_eq!(test.iter().filter(|&&i| y[i] == 1).count(), 1);
        }
    }
}
