use complaint_triage::{
    config::{Capabilities, StorageBackend, StorageConfig, TrainingConfig},
    dataset::prepare,
    embedding::HashingEmbedder,
    ml::{Trainer, TrainedBundle},
    models::ComplaintRecord,
    state::{create_bundle_store, BundleStore, InMemoryBundleStore, SledBundleStore, BUNDLE_KEY},
};
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to train a small bundle
fn create_test_bundle() -> TrainedBundle {
    let mut records = Vec::new();
    for i in 0..5 {
        records.push(
            ComplaintRecord::new(format!("Walang tubig sa gripo {}", i))
                .with_category("Water")
                .with_severity(if i % 2 == 0 { "High" } else { "Low" }),
        );
        records.push(
            ComplaintRecord::new(format!("Butas ang kalsada sa kanto {}", i))
                .with_category("Road")
                .with_severity(if i % 2 == 0 { "Medium" } else { "Low" }),
        );
    }

    let config = TrainingConfig {
        n_trees: 10,
        ..TrainingConfig::default()
    };
    let prepared = prepare(&records, 3).unwrap();
    let (bundle, _) = Trainer::new(config, Capabilities::none(), 4)
        .train_with_embedder(&prepared, Arc::new(HashingEmbedder::new(24).unwrap()))
        .unwrap();
    bundle
}

/// Test suite that runs against any BundleStore implementation
fn test_store_operations(store: Arc<dyn BundleStore>) {
    // Test 1: Empty store
    assert!(!store.has_bundle().unwrap());
    assert!(store.load_bundle().unwrap_err().is_not_trained());

    // Test 2: Save and load
    let bundle = create_test_bundle();
    store.save_bundle(&bundle).unwrap();
    assert!(store.has_bundle().unwrap());

    let loaded = store.load_bundle().unwrap();
    assert_eq!(loaded.metadata, bundle.metadata);
    assert_eq!(loaded.mappings, bundle.mappings);
    assert_eq!(loaded.scaler, bundle.scaler);
    assert_eq!(loaded.embedder_model, "hashing-ngram-24");

    // Test 3: Replace
    let replacement = create_test_bundle();
    store.save_bundle(&replacement).unwrap();
    assert_eq!(
        store.load_bundle().unwrap().metadata.run_id,
        replacement.metadata.run_id
    );

    // Test 4: Delete
    assert!(store.delete_bundle().unwrap());
    assert!(!store.has_bundle().unwrap());
}

#[test]
fn test_in_memory_store() {
    test_store_operations(Arc::new(InMemoryBundleStore::new()));
}

#[test]
fn test_sled_store() {
    let temp_dir = TempDir::new().unwrap();
    test_store_operations(Arc::new(SledBundleStore::new(temp_dir.path()).unwrap()));
}

#[test]
fn test_store_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Sled,
        path: temp_dir.path().join("bundles"),
    };

    test_store_operations(create_bundle_store(&config).unwrap());
}

#[test]
fn test_sled_persistence_across_reopens() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    let bundle = create_test_bundle();

    {
        let store = SledBundleStore::new(&path).unwrap();
        store.save_bundle(&bundle).unwrap();
        store.flush().unwrap();
    }

    {
        let store = SledBundleStore::new(&path).unwrap();
        let loaded = store.load_bundle().unwrap();
        assert_eq!(loaded.metadata.run_id, bundle.metadata.run_id);
        assert_eq!(
            loaded.mappings.category.classes(),
            &["Road".to_string(), "Water".to_string()]
        );
        assert!(loaded.validate().is_ok());
    }
}

#[test]
fn test_corrupt_bundle_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();

    {
        let db = sled::open(&path).unwrap();
        let tree = db.open_tree("bundles").unwrap();
        tree.insert(BUNDLE_KEY, &b"not a bundle"[..]).unwrap();
        tree.flush().unwrap();
    }

    let store = SledBundleStore::new(&path).unwrap();
    assert!(store.has_bundle().unwrap());
    let err = store.load_bundle().unwrap_err();
    assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
}
