use crate::config::{Capabilities, Config};
use crate::dataset::{self, PreparedDataset};
use crate::embedding::{DefaultEmbedderProvider, EmbedderProvider};
use crate::error::Result;
use crate::ml::models::{BundleSummary, ComplaintPrediction, TrainedBundle, TrainingReport};
use crate::ml::predictor::Predictor;
use crate::ml::trainer::Trainer;
use crate::models::ComplaintRecord;
use crate::state::{create_bundle_store, BundleStore};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Complaint classification service
///
/// Owns the bundle store and the currently loaded model. A retrain builds a
/// new bundle, persists it, then swaps the loaded model; the previous one is
/// never mutated, so in-flight predictions finish on the model they started with.
pub struct ComplaintClassifierService {
    /// Configuration
    config: Config,

    /// Build capabilities, resolved once
    capabilities: Capabilities,

    /// Bundle storage
    store: Arc<dyn BundleStore>,

    /// Embedder resolution
    provider: Arc<dyn EmbedderProvider>,

    /// Loaded model, if any
    model: RwLock<Option<Arc<Predictor>>>,
}

impl ComplaintClassifierService {
    /// Create a new service
    pub fn new(
        config: Config,
        store: Arc<dyn BundleStore>,
        provider: Arc<dyn EmbedderProvider>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            config,
            capabilities,
            store,
            provider,
            model: RwLock::new(None),
        }
    }

    /// Build the configured store and embedder provider
    pub fn from_config(config: Config) -> Result<Self> {
        let store = create_bundle_store(&config.storage)?;
        let provider = Arc::new(DefaultEmbedderProvider::new(config.embedder.clone()));
        Ok(Self::new(config, store, provider, Capabilities::detect()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured dataset file and train on it
    pub fn train_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<TrainingReport> {
        let records = dataset::load_csv(path)?;
        self.train(&records)
    }

    /// Train, persist, then replace the loaded model
    pub fn train(&self, records: &[ComplaintRecord]) -> Result<TrainingReport> {
        let prepared: PreparedDataset =
            dataset::prepare(records, self.config.training.min_category_support)?;

        let trainer = Trainer::new(
            self.config.training.clone(),
            self.capabilities,
            self.config.embedder.batch_size,
        );
        let (bundle, report) =
            trainer.train(&prepared, &self.config.embedder.model, self.provider.as_ref())?;

        self.store.save_bundle(&bundle)?;
        self.install(bundle)?;

        info!(run_id = %report.run_id, "New bundle persisted and loaded");
        Ok(report)
    }

    /// Load the stored bundle, replacing the loaded model
    pub fn load(&self) -> Result<Arc<Predictor>> {
        let bundle = self.store.load_bundle()?;
        self.install(bundle)
    }

    fn install(&self, bundle: TrainedBundle) -> Result<Arc<Predictor>> {
        let predictor = Arc::new(Predictor::new(
            Arc::new(bundle),
            self.provider.as_ref(),
            self.config.embedder.batch_size,
        )?);
        *self.model.write() = Some(predictor.clone());

        debug!(
            run_id = %predictor.bundle().metadata.run_id,
            embedder = %predictor.bundle().embedder_model,
            "Model installed"
        );
        Ok(predictor)
    }

    /// Loaded model, loading it from the store on first use
    pub fn predictor(&self) -> Result<Arc<Predictor>> {
        let loaded = self.model.read().clone();
        match loaded {
            Some(predictor) => Ok(predictor),
            None => self.load(),
        }
    }

    /// Classify one complaint
    pub fn predict(&self, text: &str) -> Result<ComplaintPrediction> {
        let predictor = self.predictor()?;
        predictor.predict(text)
    }

    /// Describe the current bundle
    pub fn summary(&self) -> Result<BundleSummary> {
        Ok(self.predictor()?.bundle().summary())
    }

    /// Check if a model is loaded in memory
    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    /// Get service statistics
    pub fn stats(&self) -> Result<ServiceStats> {
        let loaded = self.model.read().clone();
        Ok(ServiceStats {
            is_loaded: loaded.is_some(),
            has_stored_bundle: self.store.has_bundle()?,
            run_id: loaded.as_ref().map(|p| p.bundle().metadata.run_id.to_string()),
            embedder_model: loaded.as_ref().map(|p| p.bundle().embedder_model.clone()),
            n_features: loaded.as_ref().map(|p| p.bundle().n_features()),
            oversampling_available: self.capabilities.oversampling,
        })
    }
}

/// Service statistics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServiceStats {
    pub is_loaded: bool,
    pub has_stored_bundle: bool,
    pub run_id: Option<String>,
    pub embedder_model: Option<String>,
    pub n_features: Option<usize>,
    pub oversampling_available: bool,
}
