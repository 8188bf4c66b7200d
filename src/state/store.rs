use crate::error::{AppError, Result};
use crate::ml::TrainedBundle;
use parking_lot::RwLock;

/// Well-known key of the current bundle
pub const BUNDLE_KEY: &str = "models.bundle";

/// Trait for trained-bundle storage.
///
/// A bundle is written and read whole; there is no partial read.
pub trait BundleStore: Send + Sync {
    /// Replace the stored bundle
    fn save_bundle(&self, bundle: &TrainedBundle) -> Result<()>;

    /// Load the stored bundle, `NotTrained` when there is none
    fn load_bundle(&self) -> Result<TrainedBundle>;

    /// Check whether a bundle is stored
    fn has_bundle(&self) -> Result<bool>;

    /// Remove the stored bundle, returning whether one existed
    fn delete_bundle(&self) -> Result<bool>;
}

pub(crate) fn encode_bundle(bundle: &TrainedBundle) -> Result<Vec<u8>> {
    bincode::serialize(bundle)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize bundle: {}", e)))
}

pub(crate) fn decode_bundle(bytes: &[u8]) -> Result<TrainedBundle> {
    let bundle: TrainedBundle = bincode::deserialize(bytes)
        .map_err(|e| AppError::Serialization(format!("Failed to deserialize bundle: {}", e)))?;
    bundle.validate()?;
    Ok(bundle)
}

pub(crate) fn not_trained() -> AppError {
    AppError::NotTrained(format!(
        "no bundle stored under '{}'; run `complaint-triage train` first",
        BUNDLE_KEY
    ))
}

/// In-memory bundle store (for testing and one-shot runs)
///
/// Holds the encoded bytes so loads behave like a persistent store.
#[derive(Default)]
pub struct InMemoryBundleStore {
    bundle: RwLock<Option<Vec<u8>>>,
}

impl InMemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BundleStore for InMemoryBundleStore {
    fn save_bundle(&self, bundle: &TrainedBundle) -> Result<()> {
        let bytes = encode_bundle(bundle)?;
        *self.bundle.write() = Some(bytes);
        tracing::debug!(run_id = %bundle.metadata.run_id, "Bundle saved in memory");
        Ok(())
    }

    fn load_bundle(&self) -> Result<TrainedBundle> {
        match self.bundle.read().as_deref() {
            Some(bytes) => decode_bundle(bytes),
            None => Err(not_trained()),
        }
    }

    fn has_bundle(&self) -> Result<bool> {
        Ok(self.bundle.read().is_some())
    }

    fn delete_bundle(&self) -> Result<bool> {
        Ok(self.bundle.write().take().is_some())
    }
}
