//! Text embedders.
//!
//! The pipeline only needs "text in, fixed-length vector out". Every trained
//! bundle records the model id it was built with, and prediction resolves the
//! embedder through an [`EmbedderProvider`] using that id.

pub mod hashing;
pub mod remote;

pub use hashing::HashingEmbedder;
pub use remote::RemoteEmbedder;

use crate::config::EmbedderConfig;
use crate::error::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Model id used when nothing else is configured
pub const DEFAULT_EMBEDDER_MODEL: &str = "hashing-ngram-256";

/// Maps text to fixed-dimension vectors
pub trait Embedder: Send + Sync {
    /// Identifier persisted in trained bundles
    fn model_id(&self) -> &str;

    /// Length of every returned vector
    fn dimension(&self) -> usize;

    /// Embed `texts` in order, issuing at most `batch_size` texts per call
    fn embed(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>>;
}

/// Resolves an embedder from its model id
pub trait EmbedderProvider: Send + Sync {
    fn load(&self, model_id: &str) -> Result<Arc<dyn Embedder>>;
}

/// Resolves `hashing-ngram-<dim>` locally and anything else through the
/// configured remote endpoint.
#[derive(Debug, Clone)]
pub struct DefaultEmbedderProvider {
    config: EmbedderConfig,
}

impl DefaultEmbedderProvider {
    pub fn new(config: EmbedderConfig) -> Self {
        Self { config }
    }
}

impl Default for DefaultEmbedderProvider {
    fn default() -> Self {
        Self::new(EmbedderConfig::default())
    }
}

impl EmbedderProvider for DefaultEmbedderProvider {
    fn load(&self, model_id: &str) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = HashingEmbedder::from_model_id(model_id)? {
            tracing::debug!(
                model = model_id,
                dimension = embedder.dimension(),
                "Using hashing embedder"
            );
            return Ok(Arc::new(embedder));
        }

        let endpoint = self.config.endpoint.as_deref().ok_or_else(|| {
            AppError::embedder(
                model_id,
                "no embeddings endpoint configured (set embedder.endpoint)",
            )
        })?;

        let api_key = match &self.config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                AppError::embedder(model_id, format!("environment variable {} is not set", var))
            })?),
            None => None,
        };

        let embedder = RemoteEmbedder::connect(
            endpoint,
            model_id,
            api_key.as_deref(),
            Duration::from_secs(self.config.timeout_secs),
            self.config.max_retries,
        )?;
        tracing::info!(
            model = model_id,
            endpoint = endpoint,
            dimension = embedder.dimension(),
            "Connected to remote embedder"
        );
        Ok(Arc::new(embedder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider_resolves_hashing_model() {
        let provider = DefaultEmbedderProvider::default();
        let embedder = provider.load(DEFAULT_EMBEDDER_MODEL).unwrap();

        assert_eq!(embedder.model_id(), DEFAULT_EMBEDDER_MODEL);
        assert_eq!(embedder.dimension(), 256);
    }

    #[test]
    fn test_unknown_model_without_endpoint_fails() {
        let provider = DefaultEmbedderProvider::default();
        let err = provider
            .load("sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2")
            .err()
            .unwrap();

        assert_eq!(err.error_code(), "EMBEDDER_ERROR");
    }
}
