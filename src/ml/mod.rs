/// Machine Learning module for complaint classification
///
/// This module provides:
/// - Feature building (embedding + length counts + keyword flags)
/// - Label encoding with rare-category collapsing
/// - Standard scaling, stratified splitting and minority oversampling
/// - Independent category and severity classifiers
/// - Training, prediction and the model lifecycle service

pub mod classifier;
pub mod features;
pub mod labels;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod sampling;
pub mod scaler;
pub mod service;
pub mod trainer;

pub use classifier::{
    Classifier, ClassifierModel, CrossValidationScore, ModelParams, TargetClassifier,
};
pub use features::{FeatureBuilder, HandcraftedFeatures, KeywordGroup, KEYWORD_GROUPS};
pub use labels::{DecodedLabel, LabelEncoder, LabelMappings};
pub use metrics::{ClassMetrics, ModelMetrics};
pub use models::{
    BundleMetadata, BundleSummary, ComplaintPrediction, Degradation, ModelMetadata, Target,
    TargetEvaluation, TrainedBundle, TrainingReport,
};
pub use predictor::Predictor;
pub use scaler::StandardScaler;
pub use service::{ComplaintClassifierService, ServiceStats};
pub use trainer::Trainer;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{Capabilities, ModelKind, TrainingConfig};
    use crate::dataset::prepare;
    use crate::embedding::HashingEmbedder;
    use crate::models::ComplaintRecord;
    use std::sync::Arc;

    pub fn small_records() -> Vec<ComplaintRecord> {
        let mut records = Vec::new();
        for i in 0..6 {
            let severity = ["Low", "High"][i % 2];
            records.push(
                ComplaintRecord::new(format!("Brownout na naman, walang kuryente {}", i))
                    .with_category("Utilities")
                    .with_severity(severity),
            );
            records.push(
                ComplaintRecord::new(format!("Baha sa kalsada hanggang tuhod {}", i))
                    .with_category("Flood")
                    .with_severity(severity),
            );
        }
        records
    }

    pub fn small_config() -> TrainingConfig {
        TrainingConfig {
            category_model: ModelKind::DecisionTree,
            severity_model: ModelKind::DecisionTree,
            ..TrainingConfig::default()
        }
    }

    /// Decision-tree bundle over a 16-dim hashing embedder
    pub fn small_bundle() -> TrainedBundle {
        let prepared = prepare(&small_records(), 3).unwrap();
        let (bundle, _) = Trainer::new(small_config(), Capabilities::none(), 8)
            .train_with_embedder(&prepared, Arc::new(HashingEmbedder::new(16).unwrap()))
            .unwrap();
        bundle
    }
}
