use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision over classes seen in truth or predictions
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Support-weighted F1 score
    pub weighted_f1: f64,

    /// Confusion matrix (rows = true class, columns = predicted class)
    pub confusion_matrix: Array2<usize>,

    /// Per-class metrics keyed by class label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,

    /// Number of evaluated samples
    pub n_samples: usize,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Score predictions against ground truth.
    ///
    /// `class_names[i]` names code `i`; codes at or beyond `class_names.len()`
    /// are named by their number.
    pub fn compute(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Self {
        let n_samples = y_true.len().min(y_pred.len());
        let n_classes = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|&c| c + 1)
            .max()
            .unwrap_or(0)
            .max(class_names.len());

        let mut confusion = Array2::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            confusion[[t, p]] += 1;
        }

        let correct = (0..n_classes).map(|c| confusion[[c, c]]).sum::<usize>();
        let accuracy = if n_samples > 0 {
            correct as f64 / n_samples as f64
        } else {
            0.0
        };

        let mut per_class = BTreeMap::new();
        let mut weighted_f1 = 0.0;
        let (mut sum_p, mut sum_r, mut sum_f1) = (0.0, 0.0, 0.0);
        let mut n_present = 0usize;

        for class_idx in 0..n_classes {
            let tp = confusion[[class_idx, class_idx]];
            let support: usize = confusion.row(class_idx).sum();
            let predicted: usize = confusion.column(class_idx).sum();

            let precision = if predicted > 0 {
                tp as f64 / predicted as f64
            } else {
                0.0
            };

            let recall = if support > 0 {
                tp as f64 / support as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            // macro averages skip classes absent from both truth and predictions
            if support > 0 || predicted > 0 {
                sum_p += precision;
                sum_r += recall;
                sum_f1 += f1;
                n_present += 1;
            }
            weighted_f1 += f1 * support as f64;

            let name = class_names
                .get(class_idx)
                .cloned()
                .unwrap_or_else(|| class_idx.to_string());
            per_class.insert(
                name,
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support,
                },
            );
        }

        let denom = n_present.max(1) as f64;
        Self {
            accuracy,
            precision: sum_p / denom,
            recall: sum_r / denom,
            f1_score: sum_f1 / denom,
            weighted_f1: if n_samples > 0 {
                weighted_f1 / n_samples as f64
            } else {
                0.0
            },
            confusion_matrix: confusion,
            per_class_metrics: per_class,
            n_samples,
        }
    }

    /// `(rows, cols)` of the confusion matrix
    pub fn confusion_shape(&self) -> (usize, usize) {
        self.confusion_matrix.dim()
    }
}

/// Support-weighted F1 of one prediction set
pub fn weighted_f1(y_true: &[usize], y_pred: &[usize]) -> f64 {
    ModelMetrics::compute(y_true, y_pred, &[]).weighted_f1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_perfect_predictions() {
        let y = vec![0, 1, 2, 1, 0];
        let metrics = ModelMetrics::compute(&y, &y, &names(&["Crime", "Noise", "Sanitation"]));

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.f1_score, 1.0);
        assert_eq!(metrics.weighted_f1, 1.0);
        assert_eq!(metrics.confusion_shape(), (3, 3));
        assert_eq!(metrics.per_class_metrics["Noise"].support, 2);
    }

    #[test]
    fn test_per_class_precision_recall() {
        let y_true = vec![0, 0, 0, 1, 1];
        let y_pred = vec![0, 0, 1, 1, 1];
        let metrics = ModelMetrics::compute(&y_true, &y_pred, &names(&["A", "B"]));

        let a = &metrics.per_class_metrics["A"];
        assert_eq!(a.precision, 1.0);
        assert!((a.recall - 2.0 / 3.0).abs() < 1e-12);

        let b = &metrics.per_class_metrics["B"];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);

        assert_eq!(metrics.confusion_matrix[[0, 1]], 1);
        assert_eq!(metrics.accuracy, 0.8);
    }

    #[test]
    fn test_macro_average_skips_absent_classes() {
        let y_true = vec![0, 0, 0, 1, 1];
        let y_pred = vec![0, 0, 1, 1, 1];
        let metrics = ModelMetrics::compute(&y_true, &y_pred, &names(&["A", "B", "C", "D"]));

        // C and D never appear, so the average is over A and B only
        let f1_a = 0.8;
        let f1_b = 0.8;
        assert!((metrics.f1_score - (f1_a + f1_b) / 2.0).abs() < 1e-12);
        assert!((metrics.recall - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-12);
        assert_eq!(metrics.per_class_metrics["C"].support, 0);
        assert_eq!(metrics.confusion_shape(), (4, 4));
    }

    #[test]
    fn test_unnamed_codes_use_numbers() {
        let metrics = ModelMetrics::compute(&[0, 3], &[0, 3], &names(&["A"]));

        assert_eq!(metrics.confusion_shape(), (4, 4));
        assert!(metrics.per_class_metrics.contains_key("3"));
    }

    #[test]
    fn test_empty_input() {
        let metrics = ModelMetrics::compute(&[], &[], &[]);

        assert_eq!(metrics.n_samples, 0);
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(weighted_f1(&[], &[]), 0.0);
    }
}
