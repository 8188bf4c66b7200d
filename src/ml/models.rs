use crate::config::ModelKind;
use crate::dataset::ClassDistribution;
use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, CrossValidationScore, TargetClassifier};
use crate::ml::features::N_HANDCRAFTED_FEATURES;
use crate::ml::labels::{DecodedLabel, LabelMappings};
use crate::ml::metrics::ModelMetrics;
use crate::ml::scaler::StandardScaler;
use crate::models::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::Display;
use uuid::Uuid;

/// Prediction target; each has its own independent classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Target {
    Category,
    Severity,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Target this model predicts
    pub target: Target,

    /// Configured classifier family
    pub model_kind: ModelKind,

    /// Model actually fitted ("constant" when only one class was seen)
    pub model_name: String,

    /// Training timestamp
    pub trained_at: Option<DateTime<Utc>>,

    /// Number of training samples (after oversampling)
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Number of distinct classes seen during fit
    pub n_classes: usize,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}

impl ModelMetadata {
    pub fn new(
        target: Target,
        model_kind: ModelKind,
        hyperparameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            target,
            model_kind,
            model_name: model_kind.to_string(),
            trained_at: None,
            n_training_samples: 0,
            n_features: 0,
            n_classes: 0,
            hyperparameters,
        }
    }

    pub(crate) fn record_fit(
        &mut self,
        n_samples: usize,
        n_features: usize,
        n_classes: usize,
        model_name: &str,
    ) {
        self.trained_at = Some(Utc::now());
        self.n_training_samples = n_samples;
        self.n_features = n_features;
        self.n_classes = n_classes;
        self.model_name = model_name.to_string();
    }
}

/// Identity of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,

    /// Crate version that produced the bundle
    pub version: String,

    /// Rows in the training partition (before oversampling)
    pub n_training_samples: usize,

    /// Rows in the held-out partition
    pub n_test_samples: usize,

    /// Feature vector dimension
    pub n_features: usize,
}

impl BundleMetadata {
    pub fn new(n_training_samples: usize, n_test_samples: usize, n_features: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            n_training_samples,
            n_test_samples,
            n_features,
        }
    }
}

/// Everything prediction needs from one training run. Immutable once built.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedBundle {
    pub category_classifier: TargetClassifier,
    pub severity_classifier: TargetClassifier,
    pub scaler: StandardScaler,
    pub mappings: LabelMappings,

    /// Embedder that produced the training features
    pub embedder_model: String,

    /// Output dimension of that embedder
    pub embedder_dimension: usize,

    pub metadata: BundleMetadata,
}

impl TrainedBundle {
    pub fn n_features(&self) -> usize {
        self.embedder_dimension + N_HANDCRAFTED_FEATURES
    }

    /// Check that scaler, classifiers and embedder dimension describe the same feature space
    pub fn validate(&self) -> Result<()> {
        let expected = self.n_features();
        let parts = [
            ("scaler", self.scaler.n_features()),
            ("category classifier", self.category_classifier.metadata().n_features),
            ("severity classifier", self.severity_classifier.metadata().n_features),
            ("bundle metadata", self.metadata.n_features),
        ];
        for (part, actual) in parts {
            if actual != expected {
                return Err(AppError::Serialization(format!(
                    "inconsistent bundle {}: {} expects {} features, embedder gives {}",
                    self.metadata.run_id, part, actual, expected
                )));
            }
        }

        if !self.category_classifier.is_trained() || !self.severity_classifier.is_trained() {
            return Err(AppError::NotTrained(format!(
                "bundle {} is missing a fitted classifier",
                self.metadata.run_id
            )));
        }
        Ok(())
    }

    /// Serializable description for `inspect`
    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            metadata: self.metadata.clone(),
            embedder_model: self.embedder_model.clone(),
            embedder_dimension: self.embedder_dimension,
            category_classes: self.mappings.category.classes().to_vec(),
            severity_classes: self.mappings.severity.classes().to_vec(),
            category_model: self.category_classifier.metadata().clone(),
            severity_model: self.severity_classifier.metadata().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSummary {
    pub metadata: BundleMetadata,
    pub embedder_model: String,
    pub embedder_dimension: usize,
    pub category_classes: Vec<String>,
    pub severity_classes: Vec<String>,
    pub category_model: ModelMetadata,
    pub severity_model: ModelMetadata,
}

/// A fallback taken during training because the data could not support the preferred path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Some category had fewer than 2 rows, so the split was not stratified
    NonStratifiedSplit { class: String, count: usize },

    /// Oversampling was not possible; the classifier was fit on the original rows
    OversamplingFallback { target: Target, reason: String },

    /// Cross-validation could not be scored
    CrossValidationFailed { target: Target, reason: String },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::NonStratifiedSplit { class, count } => write!(
                f,
                "category '{}' has {} row(s); used a non-stratified split",
                class, count
            ),
            Degradation::OversamplingFallback { target, reason } => {
                write!(f, "{} oversampling skipped: {}", target, reason)
            }
            Degradation::CrossValidationFailed { target, reason } => {
                write!(f, "{} cross-validation failed: {}", target, reason)
            }
        }
    }
}

/// Diagnostics for one target's classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEvaluation {
    pub target: Target,

    /// Rows the final classifier was fit on
    pub fitted_rows: usize,

    /// Synthetic rows added by oversampling
    pub synthetic_rows: usize,

    /// Diagnostic only; never affects the persisted model
    pub cross_validation: Option<CrossValidationScore>,

    /// Scores on the held-out partition
    pub test_metrics: ModelMetrics,
}

/// Everything observable about a training run besides the bundle itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub n_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub stratified_split: bool,
    pub class_distribution: ClassDistribution,

    /// Raw categories rewritten to "Other"
    pub collapsed_categories: Vec<String>,

    pub degradations: Vec<Degradation>,
    pub category: TargetEvaluation,
    pub severity: TargetEvaluation,
}

impl TrainingReport {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Classification of one complaint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintPrediction {
    pub category: DecodedLabel,
    pub severity: DecodedLabel,
    pub priority: Priority,
    pub recommended_action: String,
}

impl ComplaintPrediction {
    pub fn new(category: DecodedLabel, severity: DecodedLabel) -> Self {
        let priority = Priority::from_severity(&severity.as_text());
        Self {
            category,
            severity,
            priority,
            recommended_action: priority.recommended_action().to_string(),
        }
    }

    /// Both labels were found in the bundle's mappings
    pub fn is_fully_decoded(&self) -> bool {
        self.category.is_decoded() && self.severity.is_decoded()
    }
}
