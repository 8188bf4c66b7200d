use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::state::{BundleStore, InMemoryBundleStore, SledBundleStore};
use std::sync::Arc;

/// Create a bundle store based on configuration
pub fn create_bundle_store(config: &StorageConfig) -> Result<Arc<dyn BundleStore>> {
    match config.backend {
        StorageBackend::Sled => {
            tracing::info!(path = ?config.path, "Initializing Sled storage backend");
            Ok(Arc::new(SledBundleStore::new(&config.path)?))
        }
        StorageBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn BundleStore> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(InMemoryBundleStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_sled_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sled,
            path: temp_dir.path().join("models"),
        };

        let store = create_bundle_store(&config).unwrap();
        assert!(!store.has_bundle().unwrap());
    }

    #[test]
    fn test_create_in_memory_store() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };

        let store = create_bundle_store(&config).unwrap();
        assert!(!store.has_bundle().unwrap());
    }
}
