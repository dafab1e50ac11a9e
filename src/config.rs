//! Runtime configuration for microblock-prefetch.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! All cache, history, scheduler and service knobs live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prune::EmptyResultPolicy;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "microblock-prefetch", about = "Cache-aware block scanner with predictive prefetching")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Parquet file to serve (overrides `storage.parquet_path`).
    #[arg(long)]
    pub parquet: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Underlying store.
    pub storage: StorageConfig,

    /// Block cache sizing.
    pub cache: CacheConfig,

    /// Access history and log.
    pub history: HistoryConfig,

    /// Pruning behaviour.
    pub pruning: PruningConfig,

    /// Prefetch scheduler settings.
    pub scheduler: SchedulerConfig,

    /// Background prefetch service settings.
    pub service: ServiceConfig,
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Parquet file whose row groups are the blocks.
    pub parquet_path: PathBuf,

    /// Table name used in SQL and catalog lookups.
    pub table_id: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            parquet_path: PathBuf::from("output_microblocks.parquet"),
            table_id: "t1".to_string(),
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of blocks held in memory.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

/// Access history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Capacity of the global rolling history.
    pub global_capacity: usize,

    /// Durable access log, rewritten on every logging call.
    pub access_log_path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            global_capacity: 200,
            access_log_path: PathBuf::from("access_log.json"),
        }
    }
}

/// Pruning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// What to return when every block is pruned.
    pub empty_result: EmptyResultPolicy,
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Persisted block id ↔ token mapping.
    pub mapping_path: PathBuf,

    /// Minimum confidence for threshold-based single suggestions.
    pub prefetch_threshold: f32,

    /// Per-query history length.
    pub max_history: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mapping_path: PathBuf::from("trained_mappings.json"),
            prefetch_threshold: 0.6,
            max_history: 64,
        }
    }
}

/// Background service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Start the background prefetcher.
    pub enabled: bool,

    /// Pause between cycles in milliseconds.
    pub interval_ms: u64,

    /// Number of recent global history entries fed to the scheduler.
    pub history_len: usize,

    /// How long `stop()` waits for the loop to finish, in milliseconds.
    pub stop_timeout_ms: u64,

    /// Predictions requested per cycle.
    pub top_k: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 60_000,
            history_len: 30,
            stop_timeout_ms: 2_000,
            top_k: 10,
        }
    }
}

impl ServiceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("service.interval_ms must be positive".to_string()));
        }
        if self.history_len == 0 {
            return Err(ConfigError::Invalid("service.history_len must be positive".to_string()));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("service.top_k must be positive".to_string()));
        }
        Ok(())
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.prefetch_threshold) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.prefetch_threshold must be within [0, 1], got {}",
                self.prefetch_threshold
            )));
        }
        if self.max_history == 0 {
            return Err(ConfigError::Invalid("scheduler.max_history must be positive".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can be constructed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid("cache.capacity must be positive".to_string()));
        }
        if self.history.global_capacity == 0 {
            return Err(ConfigError::Invalid("history.global_capacity must be positive".to_string()));
        }
        self.scheduler.validate()?;
        self.service.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.cache.capacity, 64);
        assert_eq!(cfg.history.global_capacity, 200);
        assert_eq!(cfg.scheduler.max_history, 64);
        assert_eq!(cfg.service.interval(), Duration::from_secs(60));
        assert_eq!(cfg.service.history_len, 30);
        assert_eq!(cfg.service.stop_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.pruning.empty_result, EmptyResultPolicy::Empty);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{"cache": {"capacity": 8}, "pruning": {"empty_result": "full_scan"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.cache.capacity, 8);
        assert_eq!(cfg.pruning.empty_result, EmptyResultPolicy::FullScan);
        assert_eq!(cfg.service.interval_ms, 60_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cfg = Config::default();
        cfg.cache.capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.scheduler.prefetch_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.service.interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = Config::load(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(cfg.cache.capacity, 64);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"cache": {"capacity": 0}}"#).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
