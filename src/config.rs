//! Processor configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "data_topic": "orders",
//!   "message_timeout_ms": 30000,
//!   "poll_interval_ms": 1000,
//!   "store_dir": "./data"
//! }
//! ```
//!
//! Only `data_topic` is required.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Redelivery processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeliveryConfig {
    /// Topic holding the original messages; redelivered copies go here too
    pub data_topic: String,

    /// Visibility timeout in milliseconds (default 30s)
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,

    /// Redelivery poll interval in milliseconds (default 1s)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Directory holding the durable marker store
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
}

fn default_message_timeout_ms() -> u64 {
    30_000
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_store_dir() -> String {
    "./data".to_string()
}

impl RedeliveryConfig {
    /// Configuration with defaults for everything but the data topic
    pub fn new(data_topic: impl Into<String>) -> Self {
        Self {
            data_topic: data_topic.into(),
            message_timeout_ms: default_message_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            store_dir: default_store_dir(),
        }
    }

    /// Override the visibility timeout
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: RedeliveryConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Check field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_topic.trim().is_empty() {
            return Err(ConfigError::Invalid("data_topic must not be empty".into()));
        }

        if self.message_timeout_ms == 0 {
            return Err(ConfigError::Invalid("message_timeout_ms must be > 0".into()));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }

        Ok(())
    }

    /// Visibility timeout
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Store directory as a path
    pub fn store_path(&self) -> &Path {
        Path::new(&self.store_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let config: RedeliveryConfig = serde_json::from_str(r#"{"data_topic": "orders"}"#).unwrap();
        assert_eq!(config.message_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.store_dir, "./data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_topic_rejected() {
        assert!(serde_json::from_str::<RedeliveryConfig>("{}").is_err());
        assert!(RedeliveryConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = RedeliveryConfig::new("t").with_message_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = RedeliveryConfig::new("t").with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("redeliver.json");
        fs::write(
            &path,
            r#"{"data_topic": "orders", "message_timeout_ms": 5000, "store_dir": "/tmp/m"}"#,
        )
        .unwrap();

        let config = RedeliveryConfig::load(&path).unwrap();
        assert_eq!(config.message_timeout_ms, 5000);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.store_path(), Path::new("/tmp/m"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RedeliveryConfig::load(Path::new("/nonexistent/redeliver.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
