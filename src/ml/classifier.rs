use crate::config::{ModelKind, TrainingConfig};
use crate::error::{AppError, Result};
use crate::ml::metrics::weighted_f1;
use crate::ml::models::{ModelMetadata, Target};
use crate::ml::sampling::{select_rows, stratified_kfold};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::BTreeMap;

/// Trait for single-target classifiers
pub trait Classifier: Send + Sync {
    /// Fit on a feature matrix and dense class codes
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()>;

    /// Predict class codes
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Hyperparameters for one classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub kind: ModelKind,
    pub n_trees: u16,
    pub max_depth: u16,
    pub seed: u64,
}

impl ModelParams {
    pub fn for_target(target: Target, config: &TrainingConfig) -> Self {
        let kind = match target {
            Target::Category => config.category_model,
            Target::Severity => config.severity_model,
        };
        Self {
            kind,
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            seed: config.random_state,
        }
    }

    fn describe(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        match self.kind {
            ModelKind::RandomForest => {
                params.insert("n_trees".to_string(), self.n_trees.to_string());
                params.insert("max_depth".to_string(), self.max_depth.to_string());
                params.insert("seed".to_string(), self.seed.to_string());
            }
            ModelKind::DecisionTree => {
                params.insert("max_depth".to_string(), self.max_depth.to_string());
            }
            ModelKind::LogisticRegression => {}
        }
        params
    }
}

/// Fitted model for one target
#[derive(Serialize, Deserialize)]
pub enum ClassifierModel {
    RandomForest(RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>),
    DecisionTree(DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>),
    LogisticRegression(LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>),
    /// Only one class was present in the training labels
    Constant(usize),
}

impl ClassifierModel {
    fn name(&self) -> &'static str {
        match self {
            ClassifierModel::RandomForest(_) => "random_forest",
            ClassifierModel::DecisionTree(_) => "decision_tree",
            ClassifierModel::LogisticRegression(_) => "logistic_regression",
            ClassifierModel::Constant(_) => "constant",
        }
    }
}

impl std::fmt::Debug for ClassifierModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierModel::Constant(class) => write!(f, "Constant({})", class),
            other => f.write_str(other.name()),
        }
    }
}

/// Classifier for one prediction target (category or severity)
#[derive(Debug, Serialize, Deserialize)]
pub struct TargetClassifier {
    /// Model metadata
    metadata: ModelMetadata,

    /// Hyperparameters
    params: ModelParams,

    /// Trained model
    model: Option<ClassifierModel>,
}

impl TargetClassifier {
    pub fn new(target: Target, params: ModelParams) -> Self {
        Self {
            metadata: ModelMetadata::new(target, params.kind, params.describe()),
            params,
            model: None,
        }
    }

    pub fn target(&self) -> Target {
        self.metadata.target
    }

    fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
        let shape = arr.shape();
        let data: Vec<f64> = arr.iter().copied().collect();
        DenseMatrix::new(shape[0], shape[1], data, false)
    }

    fn vec_to_labels(vec: &[usize]) -> Vec<i32> {
        vec.iter().map(|&x| x as i32).collect()
    }

    fn fit_model(&self, x: &DenseMatrix<f64>, y: &Vec<i32>) -> Result<ClassifierModel> {
        let failed = |e: smartcore::error::Failed| {
            AppError::Training(format!(
                "Failed to train {} classifier ({}): {}",
                self.metadata.target, self.params.kind, e
            ))
        };

        let model = match self.params.kind {
            ModelKind::RandomForest => {
                let params = RandomForestClassifierParameters::default()
                    .with_n_trees(self.params.n_trees)
                    .with_max_depth(self.params.max_depth)
                    .with_seed(self.params.seed);
                ClassifierModel::RandomForest(
                    RandomForestClassifier::fit(x, y, params).map_err(failed)?,
                )
            }
            ModelKind::DecisionTree => {
                let params = DecisionTreeClassifierParameters::default()
                    .with_max_depth(self.params.max_depth)
                    .with_criterion(SplitCriterion::Gini);
                ClassifierModel::DecisionTree(
                    DecisionTreeClassifier::fit(x, y, params).map_err(failed)?,
                )
            }
            ModelKind::LogisticRegression => ClassifierModel::LogisticRegression(
                LogisticRegression::fit(x, y, LogisticRegressionParameters::default())
                    .map_err(failed)?,
            ),
        };
        Ok(model)
    }
}

impl Classifier for TargetClassifier {
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        if features.nrows() != labels.len() || labels.is_empty() {
            return Err(AppError::Training(format!(
                "cannot fit {} classifier on {} rows with {} labels",
                self.metadata.target,
                features.nrows(),
                labels.len()
            )));
        }

        let mut classes: Vec<usize> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();

        let model = if classes.len() == 1 {
            tracing::warn!(
                target_name = %self.metadata.target,
                class = classes[0],
                "Only one class present, fitting constant classifier"
            );
            ClassifierModel::Constant(classes[0])
        } else {
            let x = Self::ndarray_to_densematrix(features);
            let y = Self::vec_to_labels(labels);
            self.fit_model(&x, &y)?
        };

        self.metadata.record_fit(features.nrows(), features.ncols(), classes.len(), model.name());
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self.model.as_ref().ok_or_else(|| {
            AppError::NotTrained(format!("{} classifier has not been fitted", self.metadata.target))
        })?;

        if features.ncols() != self.metadata.n_features {
            return Err(AppError::DimensionMismatch {
                expected: self.metadata.n_features,
                actual: features.ncols(),
            });
        }

        let predict_failed =
            |e: smartcore::error::Failed| AppError::Training(format!("Prediction failed: {}", e));

        let codes = match model {
            ClassifierModel::Constant(class) => vec![*class; features.nrows()],
            ClassifierModel::RandomForest(m) => m
                .predict(&Self::ndarray_to_densematrix(features))
                .map_err(predict_failed)?
                .into_iter()
                .map(|c| c as usize)
                .collect(),
            ClassifierModel::DecisionTree(m) => m
                .predict(&Self::ndarray_to_densematrix(features))
                .map_err(predict_failed)?
                .into_iter()
                .map(|c| c as usize)
                .collect(),
            ClassifierModel::LogisticRegression(m) => m
                .predict(&Self::ndarray_to_densematrix(features))
                .map_err(predict_failed)?
                .into_iter()
                .map(|c| c as usize)
                .collect(),
        };
        Ok(codes)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// Mean weighted-F1 over stratified folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationScore {
    pub folds: usize,
    pub fold_scores: Vec<f64>,
    pub mean: f64,
}

/// Cross-validate a fresh classifier per fold on untouched training rows
pub fn cross_validate<C, F>(
    make: F,
    features: &Array2<f64>,
    labels: &[usize],
    n_splits: usize,
    seed: u64,
) -> Result<CrossValidationScore>
where
    C: Classifier,
    F: Fn() -> C,
{
    let splits = stratified_kfold(labels, n_splits, seed);
    let mut fold_scores = Vec::with_capacity(splits.len());

    for (train_idx, test_idx) in &splits {
        if test_idx.is_empty() || train_idx.is_empty() {
            continue;
        }
        let y_train: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
        let y_test: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();

        let mut model = make();
        model.fit(&select_rows(features, train_idx), &y_train)?;
        let y_pred = model.predict(&select_rows(features, test_idx))?;
        fold_scores.push(weighted_f1(&y_test, &y_pred));
    }

    if fold_scores.is_empty() {
        return Err(AppError::Training(
            "no cross-validation fold had both train and test rows".to_string(),
        ));
    }

    let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
    Ok(CrossValidationScore {
        folds: fold_scores.len(),
        fold_scores,
        mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dataset(n_samples: usize, n_classes: usize) -> (Array2<f64>, Vec<usize>) {
        let labels: Vec<usize> = (0..n_samples).map(|i| i % n_classes).collect();
        let features = Array2::from_shape_fn((n_samples, 3), |(i, j)| {
            let class = (i % n_classes) as f64;
            match j {
                0 => class * 10.0 + (i as f64 * 0.01),
                1 => -class * 5.0,
                _ => (i % 7) as f64,
            }
        });
        (features, labels)
    }

    fn params(kind: ModelKind) -> ModelParams {
        ModelParams {
            kind,
            n_trees: 10,
            max_depth: 5,
            seed: 42,
        }
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = create_test_dataset(60, 3);
        let mut classifier =
            TargetClassifier::new(Target::Category, params(ModelKind::RandomForest));

        assert!(!classifier.is_trained());
        classifier.fit(&x, &y).unwrap();

        assert!(classifier.is_trained());
        assert_eq!(classifier.metadata().n_classes, 3);

        // per-node feature sampling can pick the noise column, so allow a few misses
        let predictions = classifier.predict(&x).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy >= 0.9, "training accuracy {}", accuracy);
    }

    #[test]
    fn test_decision_tree_classifier() {
        let (x, y) = create_test_dataset(40, 2);
        let mut classifier =
            TargetClassifier::new(Target::Severity, params(ModelKind::DecisionTree));

        classifier.fit(&x, &y).unwrap();

        assert_eq!(classifier.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_logistic_regression_classifier() {
        let (x, y) = create_test_dataset(40, 2);
        let mut classifier =
            TargetClassifier::new(Target::Severity, params(ModelKind::LogisticRegression));

        classifier.fit(&x, &y).unwrap();
        let predictions = classifier.predict(&x).unwrap();

        assert_eq!(predictions.len(), 40);
        assert!(predictions.iter().all(|&c| c < 2));
    }

    #[test]
    fn test_single_class_fits_constant() {
        let (x, _) = create_test_dataset(10, 2);
        let y = vec![4; 10];
        let mut classifier =
            TargetClassifier::new(Target::Severity, params(ModelKind::RandomForest));

        classifier.fit(&x, &y).unwrap();

        assert_eq!(classifier.metadata().model_name, "constant");
        assert_eq!(classifier.predict(&x).unwrap(), vec![4; 10]);
    }

    #[test]
    fn test_predict_before_fit_is_not_trained() {
        let classifier = TargetClassifier::new(Target::Category, params(ModelKind::RandomForest));
        let err = classifier.predict(&Array2::zeros((1, 3))).unwrap_err();

        assert!(err.is_not_trained());
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let (x, y) = create_test_dataset(20, 2);
        let mut classifier =
            TargetClassifier::new(Target::Category, params(ModelKind::DecisionTree));
        classifier.fit(&x, &y).unwrap();

        let err = classifier.predict(&Array2::zeros((1, 5))).unwrap_err();
        assert_eq!(err.error_code(), "DIMENSION_MISMATCH");
    }

    #[test]
    fn test_cross_validate() {
        let (x, y) = create_test_dataset(50, 2);

        let score = cross_validate(
            || TargetClassifier::new(Target::Category, params(ModelKind::DecisionTree)),
            &x,
            &y,
            5,
            42,
        )
        .unwrap();

        assert_eq!(score.folds, 5);
        assert!(score.mean > 0.9 && score.mean <= 1.0);
    }
}
