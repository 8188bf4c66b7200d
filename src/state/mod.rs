pub mod factory;
pub mod sled_store;
pub mod store;

pub use factory::{create_bundle_store, create_in_memory_store};
pub use sled_store::SledBundleStore;
pub use store::{BundleStore, InMemoryBundleStore, BUNDLE_KEY};
