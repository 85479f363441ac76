//! Scheduler configuration
//!
//! Loaded from TOML (every field optional, defaults below) or built in code.
//!
//! ```toml
//! max_concurrent_tasks = 3
//! retry_delay_ms = 5000
//! default_max_retries = 3
//! batch_size = 5
//! retention_hours = 24
//! cleanup_interval_secs = 3600
//! batch_interval_secs = 300
//! retry_permanent_errors = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Process-wide cap on tasks in `running`.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Base retry delay; attempt `n` waits `retry_delay * n`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// `max_retries` for tasks created without an explicit value.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Chunk size for `batch_sync`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retention window used by the maintenance reaper.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_batch_interval_secs")]
    pub batch_interval_secs: u64,

    /// When false, an attempt whose errors are all permanent fails the task
    /// without spending retry budget.
    #[serde(default = "default_retry_permanent_errors")]
    pub retry_permanent_errors: bool,
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_batch_size() -> usize {
    5
}

fn default_retention_hours() -> u64 {
    24
}

fn default_cleanup_interval_secs() -> u64 {
    3_600
}

fn default_batch_interval_secs() -> u64 {
    300
}

fn default_retry_permanent_errors() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            retry_delay_ms: default_retry_delay_ms(),
            default_max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            retention_hours: default_retention_hours(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            batch_interval_secs: default_batch_interval_secs(),
            retry_permanent_errors: default_retry_permanent_errors(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.cleanup_interval_secs == 0 || self.batch_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "maintenance intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn with_max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = n;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_default_max_retries(mut self, n: u32) -> Self {
        self.default_max_retries = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_retry_permanent_errors(mut self, retry: bool) -> Self {
        self.retry_permanent_errors = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gets_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            max_concurrent_tasks = 8
            retry_permanent_errors = false
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_tasks, 8);
        assert!(!config.retry_permanent_errors);
        assert_eq!(config.batch_size, 5);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = SchedulerConfig::from_toml_str("max_concurrent_tasks = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_retry_delay_saturates() {
        let config = SchedulerConfig::default().with_retry_delay(Duration::MAX);
        assert_eq!(config.retry_delay_ms, u64::MAX);

        let config = SchedulerConfig::default().with_retry_delay(Duration::from_millis(1500));
        assert_eq!(config.retry_delay_ms, 1500);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SchedulerConfig::from_toml_str("batch_size = \"five\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchedulerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
