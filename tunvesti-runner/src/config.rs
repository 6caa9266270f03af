//! Pipeline configuration, stored as TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Stage-specific settings are handed to the core stages as
//! their own config structs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tunvesti_core::{CorrelationConfig, MetricsConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("hash config: {0}")]
    Hash(#[from] serde_json::Error),
}

/// Where the input sources live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Bulk historical load. Required.
    pub historical: PathBuf,
    /// Directory of scraped daily batches.
    pub daily_updates_dir: PathBuf,
    pub stock_batch_prefix: String,
    pub index_batch_prefix: String,
    pub benchmark: PathBuf,
    pub sectors: PathBuf,
    pub dividends: PathBuf,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            historical: PathBuf::from("data/raw/historical_stocks.csv"),
            daily_updates_dir: PathBuf::from("data/raw/daily_updates"),
            stock_batch_prefix: "updated_stocks_".to_string(),
            index_batch_prefix: "updated_index_".to_string(),
            benchmark: PathBuf::from("data/raw/tunindex.csv"),
            sectors: PathBuf::from("data/raw/sectors.csv"),
            dividends: PathBuf::from("data/raw/dividends.csv"),
        }
    }
}

/// Output directory and table file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    pub dir: PathBuf,
    pub reconciled: String,
    pub enriched: String,
    pub fact: String,
    pub dim_date: String,
    pub dim_stock: String,
    pub correlation_matrix: String,
    pub correlation_pairs: String,
    pub stock_benchmark: String,
    pub sector_benchmark: String,
    pub manifest: String,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/processed"),
            reconciled: "merged_stocks.csv".to_string(),
            enriched: "enriched_stocks.csv".to_string(),
            fact: "fact_stock_daily.csv".to_string(),
            dim_date: "dim_date.csv".to_string(),
            dim_stock: "dim_stock.csv".to_string(),
            correlation_matrix: "correlation_matrix.csv".to_string(),
            correlation_pairs: "correlation_pairs.csv".to_string(),
            stock_benchmark: "tunindex_correlation.csv".to_string(),
            sector_benchmark: "sector_correlation.csv".to_string(),
            manifest: "run_manifest.json".to_string(),
        }
    }
}

impl OutputsConfig {
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inputs: InputsConfig,
    pub outputs: OutputsConfig,
    pub metrics: MetricsConfig,
    pub correlation: CorrelationConfig,
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.metrics
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.correlation.min_benchmark_overlap < 2 {
            return Err(ConfigError::Invalid(
                "correlation.min_benchmark_overlap must be at least 2".into(),
            ));
        }
        if self.correlation.rolling_window < 2 {
            return Err(ConfigError::Invalid(
                "correlation.rolling_window must be at least 2".into(),
            ));
        }
        if self.inputs.stock_batch_prefix.is_empty() || self.inputs.index_batch_prefix.is_empty()
        {
            return Err(ConfigError::Invalid("batch prefixes must not be empty".into()));
        }
        Ok(())
    }

    /// Content hash of the effective configuration (BLAKE3 over its JSON form).
    /// Fails when a configured path is not valid UTF-8.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
