//! Configuration loading
//!
//! Layered resolution, highest priority first:
//! 1. Environment variables (`CUBETRIGGERS_*`)
//! 2. TOML config file (explicit path, else `~/.config/cubetriggers/config.toml`)
//! 3. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_ngram_min_length() -> usize {
    4
}

fn default_ngram_max_length() -> usize {
    6
}

fn default_progress_batch_size() -> usize {
    10
}

fn default_event_bus_capacity() -> usize {
    100
}

fn default_import_max_attempts() -> u32 {
    3
}

fn default_import_backoff_ms() -> u64 {
    2000
}

fn default_aggregate_max_attempts() -> u32 {
    2
}

fn default_aggregate_backoff_ms() -> u64 {
    5000
}

fn default_aggregate_delay_ms() -> u64 {
    5000
}

fn default_database_max_lock_wait_ms() -> u64 {
    5000
}

/// Worker configuration, loadable from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file path; None means platform data dir default
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Minimum trigger length in moves
    #[serde(default = "default_ngram_min_length")]
    pub ngram_min_length: usize,

    /// Maximum trigger length in moves
    #[serde(default = "default_ngram_max_length")]
    pub ngram_max_length: usize,

    /// Progress is persisted and broadcast every this many algorithms
    #[serde(default = "default_progress_batch_size")]
    pub progress_batch_size: usize,

    /// EventBus broadcast channel capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Import jobs: total delivery attempts before giving up
    #[serde(default = "default_import_max_attempts")]
    pub import_max_attempts: u32,

    /// Import jobs: base backoff delay, doubled per retry
    #[serde(default = "default_import_backoff_ms")]
    pub import_backoff_ms: u64,

    /// Aggregate jobs: total delivery attempts before giving up
    #[serde(default = "default_aggregate_max_attempts")]
    pub aggregate_max_attempts: u32,

    /// Aggregate jobs: base backoff delay, doubled per retry
    #[serde(default = "default_aggregate_backoff_ms")]
    pub aggregate_backoff_ms: u64,

    /// Aggregate jobs run this long after being scheduled, so the import
    /// that scheduled them has normally finished committing
    #[serde(default = "default_aggregate_delay_ms")]
    pub aggregate_delay_ms: u64,

    /// Maximum total time to retry a "database is locked" error
    #[serde(default = "default_database_max_lock_wait_ms")]
    pub database_max_lock_wait_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        // serde defaults and Default must agree; an empty TOML table is
        // exactly the default config
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl Config {
    /// Load configuration, preferring `explicit_path` when given
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::config_file_path(explicit_path) {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                tracing::debug!(path = %path.display(), "Loaded config file");
                config
            }
            Some(path) if explicit_path.is_some() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            _ => Config::default(),
        };

        if let Ok(db) = std::env::var("CUBETRIGGERS_DATABASE") {
            config.database_path = Some(PathBuf::from(db));
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolve the database path, falling back to the platform data dir
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cubetriggers")
                .join("cubetriggers.db"),
        }
    }

    fn config_file_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("CUBETRIGGERS_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("cubetriggers").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.ngram_min_length == 0 {
            return Err(Error::Config("ngram_min_length must be at least 1".to_string()));
        }
        if self.ngram_max_length < self.ngram_min_length {
            return Err(Error::Config(format!(
                "ngram_max_length ({}) must be >= ngram_min_length ({})",
                self.ngram_max_length, self.ngram_min_length
            )));
        }
        if self.progress_batch_size == 0 {
            return Err(Error::Config("progress_batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_tunables() {
        let config = Config::default();
        assert_eq!(config.ngram_min_length, 4);
        assert_eq!(config.ngram_max_length, 6);
        assert_eq!(config.progress_batch_size, 10);
        assert_eq!(config.import_max_attempts, 3);
        assert_eq!(config.aggregate_max_attempts, 2);
        assert_eq!(config.aggregate_delay_ms, 5000);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("ngram_min_length = 2\n").unwrap();
        assert_eq!(config.ngram_min_length, 2);
        assert_eq!(config.ngram_max_length, 6);
    }

    #[test]
    fn inverted_length_range_is_rejected() {
        let config: Config =
            toml::from_str("ngram_min_length = 5\nngram_max_length = 3\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/cubetriggers.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
