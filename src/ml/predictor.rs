use crate::embedding::{Embedder, EmbedderProvider};
use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::features::FeatureBuilder;
use crate::ml::models::{ComplaintPrediction, TrainedBundle};
use std::sync::Arc;

/// A trained bundle paired with the embedder it was trained with.
///
/// Read-only after construction, so one instance can serve concurrent predictions.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: Arc<TrainedBundle>,
    features: FeatureBuilder,
}

impl Predictor {
    /// Resolve the bundle's own embedder through `provider`
    pub fn new(
        bundle: Arc<TrainedBundle>,
        provider: &dyn EmbedderProvider,
        batch_size: usize,
    ) -> Result<Self> {
        let embedder = provider.load(&bundle.embedder_model)?;
        Self::with_embedder(bundle, embedder, batch_size)
    }

    pub fn with_embedder(
        bundle: Arc<TrainedBundle>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        bundle.validate()?;

        if embedder.model_id() != bundle.embedder_model {
            return Err(AppError::embedder(
                embedder.model_id(),
                format!("bundle was trained with embedder '{}'", bundle.embedder_model),
            ));
        }
        if embedder.dimension() != bundle.embedder_dimension {
            return Err(AppError::DimensionMismatch {
                expected: bundle.embedder_dimension,
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            features: FeatureBuilder::new(embedder, batch_size),
            bundle,
        })
    }

    pub fn bundle(&self) -> &Arc<TrainedBundle> {
        &self.bundle
    }

    /// Classify one complaint
    pub fn predict(&self, text: &str) -> Result<ComplaintPrediction> {
        let raw = self.features.build(text)?;
        let scaled = self.bundle.scaler.transform_row(&raw)?;

        let category_code = first_code(self.bundle.category_classifier.predict(&scaled)?)?;
        let severity_code = first_code(self.bundle.severity_classifier.predict(&scaled)?)?;

        Ok(self.decode(category_code, severity_code))
    }

    /// Classify many complaints with one embedder pass
    pub fn predict_batch(&self, texts: &[String]) -> Result<Vec<ComplaintPrediction>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let scaled = self.bundle.scaler.transform(&self.features.build_batch(texts)?)?;
        let categories = self.bundle.category_classifier.predict(&scaled)?;
        let severities = self.bundle.severity_classifier.predict(&scaled)?;

        Ok(categories
            .into_iter()
            .zip(severities)
            .map(|(category, severity)| self.decode(category as i64, severity as i64))
            .collect())
    }

    fn decode(&self, category_code: i64, severity_code: i64) -> ComplaintPrediction {
        let prediction = ComplaintPrediction::new(
            self.bundle.mappings.category.decode(category_code),
            self.bundle.mappings.severity.decode(severity_code),
        );
        if !prediction.is_fully_decoded() {
            tracing::warn!(
                run_id = %self.bundle.metadata.run_id,
                category = %prediction.category,
                severity = %prediction.severity,
                "Predicted code missing from label mapping"
            );
        }
        prediction
    }
}

fn first_code(codes: Vec<usize>) -> Result<i64> {
    codes
        .first()
        .map(|&code| code as i64)
        .ok_or_else(|| AppError::Internal("classifier returned no prediction".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DefaultEmbedderProvider, HashingEmbedder};
    use crate::ml::labels::DecodedLabel;
    use crate::ml::test_support::small_bundle;

    fn trained_bundle() -> Arc<TrainedBundle> {
        Arc::new(small_bundle())
    }

    #[test]
    fn test_predict_uses_bundle_embedder() {
        let bundle = trained_bundle();
        let predictor = Predictor::new(bundle, &DefaultEmbedderProvider::default(), 8).unwrap();

        let prediction = predictor.predict("Walang kuryente buong gabi").unwrap();

        assert!(prediction.is_fully_decoded());
        assert!(["Utilities", "Flood"].contains(&prediction.category.as_text().as_ref()));
        assert!((1..=3).contains(&prediction.priority.value()));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let predictor =
            Predictor::new(trained_bundle(), &DefaultEmbedderProvider::default(), 8).unwrap();

        let first = predictor.predict("Baha na naman dito").unwrap();
        let second = predictor.predict("Baha na naman dito").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_batch_matches_single() {
        let predictor =
            Predictor::new(trained_bundle(), &DefaultEmbedderProvider::default(), 8).unwrap();
        let texts = vec!["Brownout po".to_string(), "Baha sa amin".to_string()];

        let batch = predictor.predict_batch(&texts).unwrap();
        for (text, prediction) in texts.iter().zip(batch) {
            assert_eq!(predictor.predict(text).unwrap(), prediction);
        }
        assert!(predictor.predict_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_codes_decode_to_raw() {
        let predictor =
            Predictor::new(trained_bundle(), &DefaultEmbedderProvider::default(), 8).unwrap();

        let prediction = predictor.decode(0, 99);

        assert!(!prediction.is_fully_decoded());
        assert_eq!(prediction.severity, DecodedLabel::RawCode(99));
        assert_eq!(prediction.priority.value(), 3);
    }

    #[test]
    fn test_rejects_different_embedder() {
        let err = Predictor::with_embedder(
            trained_bundle(),
            Arc::new(HashingEmbedder::new(32).unwrap()),
            8,
        )
        .unwrap_err();

        assert_eq!(err.error_code(), "EMBEDDER_ERROR");
    }
}
