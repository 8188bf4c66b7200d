use crate::config::{Capabilities, TrainingConfig};
use crate::dataset::PreparedDataset;
use crate::embedding::{Embedder, EmbedderProvider};
use crate::error::{AppError, Result};
use crate::ml::classifier::{
    cross_validate, Classifier, CrossValidationScore, ModelParams, TargetClassifier,
};
use crate::ml::features::{FeatureBuilder, N_HANDCRAFTED_FEATURES};
use crate::ml::labels::{label_counts, LabelEncoder};
use crate::ml::metrics::ModelMetrics;
use crate::ml::models::{
    BundleMetadata, Degradation, Target, TargetEvaluation, TrainedBundle, TrainingReport,
};
use crate::ml::sampling::{oversample, oversampling_neighbors, train_test_split};
use crate::ml::scaler::StandardScaler;
use ndarray::Array2;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Offline training job: split, featurise, scale, oversample, fit, evaluate
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
    capabilities: Capabilities,
    batch_size: usize,
}

impl Trainer {
    pub fn new(config: TrainingConfig, capabilities: Capabilities, batch_size: usize) -> Self {
        Self {
            config,
            capabilities,
            batch_size,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Resolve the embedder by id and train
    pub fn train(
        &self,
        dataset: &PreparedDataset,
        embedder_model: &str,
        provider: &dyn EmbedderProvider,
    ) -> Result<(TrainedBundle, TrainingReport)> {
        let embedder = provider.load(embedder_model)?;
        self.train_with_embedder(dataset, embedder)
    }

    /// Train with an already-loaded embedder
    pub fn train_with_embedder(
        &self,
        dataset: &PreparedDataset,
        embedder: Arc<dyn Embedder>,
    ) -> Result<(TrainedBundle, TrainingReport)> {
        self.config.validate()?;
        check_category_cardinality(dataset)?;

        let distribution = dataset.distribution();
        info!(
            rows = dataset.len(),
            category = ?distribution.category,
            severity = ?distribution.severity,
            recommended_priority = ?distribution.recommended_priority,
            "Class distribution"
        );

        let mut degradations = Vec::new();

        let split = train_test_split(
            &dataset.category_codes,
            self.config.test_size,
            self.config.random_state,
        );
        if split.test.is_empty() || split.train.is_empty() {
            return Err(AppError::Training(format!(
                "need at least 2 rows to hold out a test partition, got {}",
                dataset.len()
            )));
        }
        if !split.stratified {
            let (class, count) = distribution
                .category
                .iter()
                .min_by_key(|(_, count)| **count)
                .map(|(class, count)| (class.clone(), *count))
                .unwrap_or_default();
            let degradation = Degradation::NonStratifiedSplit { class, count };
            warn!(%degradation, "Stratified split infeasible");
            degradations.push(degradation);
        }
        info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            stratified = split.stratified,
            "Split dataset"
        );

        let features = FeatureBuilder::new(embedder, self.batch_size);
        let partition_texts = |rows: &[usize]| -> Vec<String> {
            rows.iter().map(|&i| dataset.texts[i].clone()).collect()
        };
        let x_train_raw = features.build_batch(&partition_texts(&split.train))?;
        let x_test_raw = features.build_batch(&partition_texts(&split.test))?;

        let scaler = StandardScaler::fit(&x_train_raw)?;
        let x_train = scaler.transform(&x_train_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;
        debug!(n_features = scaler.n_features(), "Fitted scaler on training partition");

        let partition = |codes: &[usize], rows: &[usize]| -> Vec<usize> {
            rows.iter().map(|&i| codes[i]).collect()
        };

        let (category_classifier, category) = self.fit_target(
            Target::Category,
            &dataset.mappings.category,
            &x_train,
            &partition(&dataset.category_codes, &split.train),
            &x_test,
            &partition(&dataset.category_codes, &split.test),
            &mut degradations,
        )?;
        let (severity_classifier, severity) = self.fit_target(
            Target::Severity,
            &dataset.mappings.severity,
            &x_train,
            &partition(&dataset.severity_codes, &split.train),
            &x_test,
            &partition(&dataset.severity_codes, &split.test),
            &mut degradations,
        )?;

        let metadata =
            BundleMetadata::new(split.train.len(), split.test.len(), features.dimension());
        let bundle = TrainedBundle {
            category_classifier,
            severity_classifier,
            scaler,
            mappings: dataset.mappings.clone(),
            embedder_model: features.embedder_model().to_string(),
            embedder_dimension: features.dimension() - N_HANDCRAFTED_FEATURES,
            metadata,
        };
        bundle.validate()?;

        let report = TrainingReport {
            run_id: bundle.metadata.run_id,
            n_rows: dataset.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            stratified_split: split.stratified,
            class_distribution: distribution,
            collapsed_categories: dataset.collapsed_categories.clone(),
            degradations,
            category,
            severity,
        };

        info!(
            run_id = %report.run_id,
            embedder = %bundle.embedder_model,
            category_accuracy = report.category.test_metrics.accuracy,
            severity_accuracy = report.severity.test_metrics.accuracy,
            degradations = report.degradations.len(),
            "Training completed"
        );
        Ok((bundle, report))
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_target(
        &self,
        target: Target,
        encoder: &LabelEncoder,
        x_train: &Array2<f64>,
        y_train: &[usize],
        x_test: &Array2<f64>,
        y_test: &[usize],
        degradations: &mut Vec<Degradation>,
    ) -> Result<(TargetClassifier, TargetEvaluation)> {
        let params = ModelParams::for_target(target, &self.config);

        let (x_fit, y_fit) = match self.maybe_oversample(target, x_train, y_train, degradations) {
            Some(resampled) => resampled,
            None => (x_train.clone(), y_train.to_vec()),
        };
        let synthetic_rows = y_fit.len() - y_train.len();

        let mut classifier = TargetClassifier::new(target, params);
        classifier.fit(&x_fit, &y_fit)?;
        info!(
            target_name = %target,
            model = %classifier.metadata().model_name,
            fitted_rows = y_fit.len(),
            synthetic_rows,
            "Fitted classifier"
        );

        let cross_validation = self.cross_validate_target(
            target,
            || TargetClassifier::new(target, params),
            x_train,
            y_train,
            degradations,
        );

        let y_pred = classifier.predict(x_test)?;
        let test_metrics = ModelMetrics::compute(y_test, &y_pred, encoder.classes());
        info!(
            target_name = %target,
            accuracy = test_metrics.accuracy,
            macro_f1 = test_metrics.f1_score,
            weighted_f1 = test_metrics.weighted_f1,
            confusion_shape = ?test_metrics.confusion_shape(),
            "Held-out evaluation"
        );
        for (label, class) in &test_metrics.per_class_metrics {
            debug!(
                target_name = %target,
                label = %label,
                precision = class.precision,
                recall = class.recall,
                f1 = class.f1_score,
                support = class.support,
                "Per-class metrics"
            );
        }

        let evaluation = TargetEvaluation {
            target,
            fitted_rows: y_fit.len(),
            synthetic_rows,
            cross_validation,
            test_metrics,
        };
        Ok((classifier, evaluation))
    }

    /// Oversampled training rows, or `None` to fit on the originals
    fn maybe_oversample(
        &self,
        target: Target,
        x_train: &Array2<f64>,
        y_train: &[usize],
        degradations: &mut Vec<Degradation>,
    ) -> Option<(Array2<f64>, Vec<usize>)> {
        if !self.config.oversampling {
            return None;
        }
        if !self.capabilities.oversampling {
            debug!(target_name = %target, "Oversampling not available in this build");
            return None;
        }

        let n_classes = y_train.iter().collect::<BTreeSet<_>>().len();
        if n_classes < 2 {
            debug!(target_name = %target, "Single class in training partition, not oversampling");
            return None;
        }

        let mut fallback = |reason: String| {
            let degradation = Degradation::OversamplingFallback { target, reason };
            warn!(%degradation, "Fitting on unresampled rows");
            degradations.push(degradation);
            None
        };

        let k = oversampling_neighbors(y_train, self.config.max_k_neighbors);
        if k < 1 {
            return fallback(format!(
                "{} rows across {} classes leave no neighbours",
                y_train.len(),
                n_classes
            ));
        }

        match oversample(x_train, y_train, k, self.config.random_state) {
            Ok(resampled) => {
                debug!(
                    target_name = %target,
                    k_neighbors = k,
                    rows = resampled.1.len(),
                    "Oversampled training rows"
                );
                Some(resampled)
            }
            Err(e) => fallback(e.to_string()),
        }
    }

    /// Informational score on the untouched training rows
    fn cross_validate_target<C, F>(
        &self,
        target: Target,
        make: F,
        x_train: &Array2<f64>,
        y_train: &[usize],
        degradations: &mut Vec<Degradation>,
    ) -> Option<CrossValidationScore>
    where
        C: Classifier,
        F: Fn() -> C,
    {
        let n_rows = y_train.len();
        if n_rows <= self.config.cv_min_rows {
            debug!(target_name = %target, rows = n_rows, "Too few rows for cross-validation");
            return None;
        }

        let folds = cv_folds(n_rows, self.config.max_cv_folds);
        match cross_validate(
            make,
            x_train,
            y_train,
            folds,
            self.config.random_state,
        ) {
            Ok(score) => {
                info!(
                    target_name = %target,
                    folds = score.folds,
                    weighted_f1 = score.mean,
                    "Cross-validation"
                );
                Some(score)
            }
            Err(e) => {
                let degradation = Degradation::CrossValidationFailed {
                    target,
                    reason: e.to_string(),
                };
                warn!(%degradation, "Cross-validation score omitted");
                degradations.push(degradation);
                None
            }
        }
    }
}

/// `clamp(n / 10, 2, max_folds)`
pub fn cv_folds(n_rows: usize, max_folds: usize) -> usize {
    (n_rows / 10).clamp(2, max_folds.max(2))
}

/// Training needs at least two category classes after collapsing
pub fn check_category_cardinality(dataset: &PreparedDataset) -> Result<()> {
    let distinct = dataset.mappings.category.len();
    if distinct < 2 {
        return Err(AppError::LabelCardinality {
            distinct,
            counts: label_counts(&dataset.categories),
        });
    }
    Ok(())
}
