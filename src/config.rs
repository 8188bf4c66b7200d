use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dataset location
    #[serde(default)]
    pub data: DataConfig,

    /// Embedder selection
    #[serde(default)]
    pub embedder: EmbedderConfig,

    /// Training pipeline parameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Bundle storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| "config/complaint-triage.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: COMPLAINT_TRIAGE__)
            .add_source(
                config::Environment::with_prefix("COMPLAINT_TRIAGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV dataset path
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Embedder model identifier, persisted into every trained bundle
    #[serde(default = "default_embedder_model")]
    pub model: String,

    /// Texts per embedder call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the endpoint API key
    pub api_key_env: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_embedder_timeout")]
    pub timeout_secs: u64,

    /// Retries for throttled or failed requests
    #[serde(default = "default_embedder_retries")]
    pub max_retries: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: default_embedder_model(),
            batch_size: default_batch_size(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: default_embedder_timeout(),
            max_retries: default_embedder_retries(),
        }
    }
}

/// Classifier family used for one prediction target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    DecisionTree,
    LogisticRegression,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    #[validate(range(min = 0.05, max = 0.5))]
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for splitting, oversampling and tree bagging
    #[serde(default = "default_random_state")]
    pub random_state: u64,

    /// Categories with fewer rows are collapsed into "Other"
    #[validate(range(min = 1))]
    #[serde(default = "default_min_category_support")]
    pub min_category_support: usize,

    /// Enable synthetic minority oversampling (subject to the build capability)
    #[serde(default = "default_true")]
    pub oversampling: bool,

    /// Upper bound on oversampling neighbours
    #[validate(range(min = 1))]
    #[serde(default = "default_max_k_neighbors")]
    pub max_k_neighbors: usize,

    /// Cross-validation only runs when the training partition has more rows than this
    #[serde(default = "default_cv_min_rows")]
    pub cv_min_rows: usize,

    /// Maximum number of cross-validation folds
    #[validate(range(min = 2))]
    #[serde(default = "default_max_cv_folds")]
    pub max_cv_folds: usize,

    /// Category classifier family
    #[serde(default = "default_model_kind")]
    pub category_model: ModelKind,

    /// Severity classifier family
    #[serde(default = "default_model_kind")]
    pub severity_model: ModelKind,

    /// Trees per forest
    #[validate(range(min = 1))]
    #[serde(default = "default_n_trees")]
    pub n_trees: u16,

    /// Maximum tree depth
    #[validate(range(min = 1))]
    #[serde(default = "default_max_depth")]
    pub max_depth: u16,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_state: default_random_state(),
            min_category_support: default_min_category_support(),
            oversampling: true,
            max_k_neighbors: default_max_k_neighbors(),
            cv_min_rows: default_cv_min_rows(),
            max_cv_folds: default_max_cv_folds(),
            category_model: default_model_kind(),
            severity_model: default_model_kind(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bundle storage backend
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path for the embedded database
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Optional pipeline capabilities, resolved once from the build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub oversampling: bool,
}

impl Capabilities {
    /// Capabilities compiled into this binary
    pub fn detect() -> Self {
        Self {
            oversampling: cfg!(feature = "oversampling"),
        }
    }

    pub fn none() -> Self {
        Self { oversampling: false }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data.csv")
}

fn default_embedder_model() -> String {
    crate::embedding::DEFAULT_EMBEDDER_MODEL.to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_embedder_timeout() -> u64 {
    30
}

fn default_embedder_retries() -> usize {
    3
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

fn default_min_category_support() -> usize {
    crate::ml::labels::MIN_CATEGORY_SUPPORT
}

fn default_max_k_neighbors() -> usize {
    5
}

fn default_cv_min_rows() -> usize {
    30
}

fn default_max_cv_folds() -> usize {
    5
}

fn default_model_kind() -> ModelKind {
    ModelKind::RandomForest
}

fn default_n_trees() -> u16 {
    100
}

fn default_max_depth() -> u16 {
    8
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/models")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.training.min_category_support, 3);
        assert_eq!(config.embedder.batch_size, 32);
        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert!(config.training.validate().is_ok());
    }

    #[test]
    fn test_training_config_validation() {
        let mut training = TrainingConfig::default();
        assert!(training.validate().is_ok());

        training.test_size = 0.9;
        assert!(training.validate().is_err());
    }

    #[test]
    fn test_model_kind_strings() {
        assert_eq!(ModelKind::RandomForest.to_string(), "random_forest");
        assert_eq!(
            "logistic_regression".parse::<ModelKind>().unwrap(),
            ModelKind::LogisticRegression
        );
    }

    #[test]
    fn test_capabilities_follow_feature_flag() {
        assert_eq!(
            Capabilities::detect().oversampling,
            cfg!(feature = "oversampling")
        );
        assert!(!Capabilities::none().oversampling);
    }
}
