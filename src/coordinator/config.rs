//! Coordinator configuration.

use crate::value::Structure;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating a [`CoordinatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning knobs for an [`ApplyCoordinator`](super::ApplyCoordinator).
///
/// ```yaml
/// max_attempts: 5
/// timeout_ms: 2000
/// list_keys: [name, key]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Read-merge-write attempts before giving up on a racing key.
    pub max_attempts: u32,
    /// Per store call deadline. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    /// Candidate key fields identifying map elements of lists.
    pub list_keys: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            max_attempts: 5,
            timeout_ms: None,
            list_keys: Structure::default().list_keys,
        }
    }
}

impl CoordinatorConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        if self.list_keys.is_empty() {
            return Err(ConfigError::Invalid("list_keys must not be empty".to_string()));
        }
        if self.list_keys.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::Invalid("list_keys entries must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn structure(&self) -> Structure {
        Structure::new(self.list_keys.clone())
    }
}
