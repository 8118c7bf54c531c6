//! Configuration model for sitelock.
//!
//! This module defines the Config struct that represents an optional
//! `config.yaml` inside the lock directory. It supports forward-compatible
//! YAML parsing (unknown fields are ignored), sensible defaults for optional
//! fields, and validation of config values.

use crate::error::{Result, SiteLockError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default maximum flag-file age in seconds before a lock is reclaimed.
///
/// Conservative: long enough to exceed the longest expected legitimate hold.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 90;

/// Configuration for the site lock.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds after which a flag file is considered stale and the lock
    /// artifacts are reclaimed at construction.
    pub max_age_seconds: u64,

    /// Override for the lock directory (default: `<root>/.sitelock`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,

    /// Whether lifecycle events are appended to the audit log.
    pub events_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
            lock_dir: None,
            events_log: true,
        }
    }
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SiteLockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward
    /// compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| SiteLockError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// A zero maximum age would make every acquired lock immediately
    /// reclaimable by the next process.
    pub fn validate(&self) -> Result<()> {
        if self.max_age_seconds == 0 {
            return Err(SiteLockError::UserError(
                "config validation failed: max_age_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
