//! config
//!
//! Cache configuration schema and loading.
//!
//! # Validation
//!
//! Config values are validated after parsing. Every knob must be at least 1:
//! a zero poll interval would spin, a zero window or capacity would cache
//! nothing, and a zero fan-out limit would deadlock containment resolution.
//!
//! # Example
//!
//! ```
//! use revcache::config::CacheConfig;
//!
//! let config = CacheConfig::from_toml_str(
//!     r#"
//!     poll_interval_secs = 5
//!     watch_window = 50
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.poll_interval_secs, 5);
//! assert_eq!(config.watch_window, 50);
//! // Unset fields keep their defaults.
//! assert_eq!(config.detail_capacity, CacheConfig::DEFAULT_DETAIL_CAPACITY);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Cache tuning knobs.
///
/// # Example
///
/// ```toml
/// poll_interval_secs = 10
/// watch_window = 20
/// detail_capacity = 100000
/// containment_fanout = 16
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Seconds between change-tracker polls of the branch head.
    pub poll_interval_secs: u64,

    /// Number of most-recent commits the change tracker watches.
    pub watch_window: usize,

    /// Maximum number of commit detail records held in memory.
    pub detail_capacity: usize,

    /// Maximum number of concurrent per-branch scans during branch
    /// containment resolution.
    pub containment_fanout: usize,
}

impl CacheConfig {
    /// Default seconds between tracker polls.
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

    /// Default tracker window size.
    pub const DEFAULT_WATCH_WINDOW: usize = 20;

    /// Default detail cache capacity.
    pub const DEFAULT_DETAIL_CAPACITY: usize = 100_000;

    /// Default containment fan-out limit.
    pub const DEFAULT_CONTAINMENT_FANOUT: usize = 16;

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for malformed TOML or unknown
    /// fields, `ConfigError::InvalidValue` for out-of-range values.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.watch_window == 0 {
            return Err(ConfigError::InvalidValue(
                "watch_window must be at least 1".to_string(),
            ));
        }
        if self.detail_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "detail_capacity must be at least 1".to_string(),
            ));
        }
        if self.containment_fanout == 0 {
            return Err(ConfigError::InvalidValue(
                "containment_fanout must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The tracker poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: Self::DEFAULT_POLL_INTERVAL_SECS,
            watch_window: Self::DEFAULT_WATCH_WINDOW,
            detail_capacity: Self::DEFAULT_DETAIL_CAPACITY,
            containment_fanout: Self::DEFAULT_CONTAINMENT_FANOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.watch_window, 20);
        assert_eq!(config.detail_capacity, 100_000);
        assert_eq!(config.containment_fanout, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = CacheConfig::from_toml_str("watch_window = 5").unwrap();
        assert_eq!(config.watch_window, 5);
        assert_eq!(
            config.poll_interval_secs,
            CacheConfig::DEFAULT_POLL_INTERVAL_SECS
        );
        assert_eq!(config.detail_capacity, CacheConfig::DEFAULT_DETAIL_CAPACITY);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = CacheConfig::from_toml_str("").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn reject_unknown_fields() {
        let result = CacheConfig::from_toml_str("watch_windw = 5");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let result = CacheConfig::from_toml_str("poll_interval_secs = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn zero_watch_window_rejected() {
        let config = CacheConfig {
            watch_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_detail_capacity_rejected() {
        let config = CacheConfig {
            detail_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_containment_fanout_rejected() {
        let config = CacheConfig {
            containment_fanout: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn poll_interval_duration() {
        let config = CacheConfig {
            poll_interval_secs: 3,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn roundtrip() {
        let config = CacheConfig {
            poll_interval_secs: 7,
            watch_window: 42,
            detail_capacity: 1_000,
            containment_fanout: 4,
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: CacheConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cache.toml");
        fs::write(&path, "poll_interval_secs = 2\nwatch_window = 8\n").unwrap();

        let config = CacheConfig::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.watch_window, 8);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = CacheConfig::load(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
