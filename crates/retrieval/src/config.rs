//! Retrieval configuration management.
//!
//! The embedding dimension and distance metric are fixed when a store is
//! created and read-only afterwards. The configuration is a plain value
//! handed to stores and to the search service.

use crate::distance::DistanceMetric;
use crate::error::{RetrievalError, RetrievalResult};
use scholar_core::config::STATE_DIR;
use scholar_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Result count used when a caller does not pass a limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Configuration for the chunk store and similarity search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Embedding vector dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Distance metric applied to every comparison
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Limit applied when the caller omits one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Larger requested limits are clamped to this
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Rows per scan batch handed to the parallel scorer
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,

    /// How long a SQLite connection waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_dimension() -> usize {
    1536
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_max_limit() -> usize {
    1000
}

fn default_scan_batch_size() -> usize {
    1024
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            metric: DistanceMetric::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            scan_batch_size: default_scan_batch_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl RetrievalConfig {
    /// Default configuration with the given dimension and metric.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> RetrievalResult<()> {
        if self.dimension == 0 {
            return Err(RetrievalError::InvalidConfig(
                "dimension must be positive".to_string(),
            ));
        }
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(RetrievalError::InvalidConfig(
                "search limits must be positive".to_string(),
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(RetrievalError::InvalidConfig(format!(
                "defaultLimit ({}) exceeds maxLimit ({})",
                self.default_limit, self.max_limit
            )));
        }
        if self.scan_batch_size == 0 {
            return Err(RetrievalError::InvalidConfig(
                "scanBatchSize must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load retrieval configuration.
///
/// Reads `.scholar/retrieval.yaml` if it exists, otherwise returns defaults.
pub fn load_config(workspace: &Path) -> AppResult<RetrievalConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("No retrieval config at {:?}, using defaults", config_path);
        return Ok(RetrievalConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: RetrievalConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    config.validate()?;

    tracing::debug!(
        "Loaded retrieval config: dimension={}, metric={}",
        config.dimension,
        config.metric
    );
    Ok(config)
}

/// Save retrieval configuration.
pub fn save_config(workspace: &Path, config: &RetrievalConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved retrieval config to {:?}", config_path);
    Ok(())
}

/// Get the path to the retrieval config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("retrieval.yaml")
}

/// Get the SQLite chunk store path.
pub fn get_store_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("chunks.sqlite")
}
