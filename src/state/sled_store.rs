use crate::error::{AppError, Result};
use crate::ml::TrainedBundle;
use crate::state::store::{decode_bundle, encode_bundle, not_trained, BundleStore, BUNDLE_KEY};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent bundle store using Sled embedded database
#[derive(Clone)]
pub struct SledBundleStore {
    db: Arc<Db>,
    bundles_tree: sled::Tree,
}

impl SledBundleStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database at {}: {}", path.display(), e))
        })?;

        let bundles_tree = db
            .open_tree("bundles")
            .map_err(|e| AppError::Storage(format!("Failed to open bundles tree: {}", e)))?;

        tracing::info!(path = %path.display(), "Initialized Sled bundle store");

        Ok(Self {
            db: Arc::new(db),
            bundles_tree,
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| AppError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db
            .size_on_disk()
            .map_err(|e| AppError::Storage(format!("Failed to get database size: {}", e)))
    }
}

impl BundleStore for SledBundleStore {
    fn save_bundle(&self, bundle: &TrainedBundle) -> Result<()> {
        let value = encode_bundle(bundle)?;

        // Single-key insert is atomic
        self.bundles_tree
            .insert(BUNDLE_KEY, value)
            .map_err(|e| AppError::Storage(format!("Failed to save bundle: {}", e)))?;

        self.bundles_tree
            .flush()
            .map_err(|e| AppError::Storage(format!("Failed to flush bundles tree: {}", e)))?;

        tracing::info!(run_id = %bundle.metadata.run_id, key = BUNDLE_KEY, "Bundle saved to Sled");
        Ok(())
    }

    fn load_bundle(&self) -> Result<TrainedBundle> {
        match self.bundles_tree.get(BUNDLE_KEY) {
            Ok(Some(bytes)) => {
                let bundle = decode_bundle(&bytes)?;
                tracing::debug!(run_id = %bundle.metadata.run_id, "Bundle loaded from Sled");
                Ok(bundle)
            }
            Ok(None) => Err(not_trained()),
            Err(e) => Err(AppError::Storage(format!("Failed to read bundle: {}", e))),
        }
    }

    fn has_bundle(&self) -> Result<bool> {
        self.bundles_tree
            .contains_key(BUNDLE_KEY)
            .map_err(|e| AppError::Storage(format!("Failed to check bundle existence: {}", e)))
    }

    fn delete_bundle(&self) -> Result<bool> {
        let removed = self
            .bundles_tree
            .remove(BUNDLE_KEY)
            .map_err(|e| AppError::Storage(format!("Failed to delete bundle: {}", e)))?;
        self.bundles_tree
            .flush()
            .map_err(|e| AppError::Storage(format!("Failed to flush bundles tree: {}", e)))?;
        Ok(removed.is_some())
    }
}
