//! Runtime configuration handed over by the page, with defaults and validation.

use crate::aliases::DEFAULT_STORAGE_KEY;
use crate::csv::DEFAULT_EXPORT_PREFIX;
use crate::redirect::DEFAULT_PRIVACY_PATH;
use crate::sync::DEFAULT_DEBOUNCE;

use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration, usually handed over from the page at startup.
///
/// Every field is optional on the wire; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinksquashConfig {
    /// Storage key the alias mapping is persisted under
    pub storage_key: String,
    /// Idle time before keystroke edits are written
    pub debounce_ms: u64,
    /// Reserved path of the privacy page
    pub privacy_path: String,
    /// File-name prefix for CSV exports
    pub export_file_prefix: String,
    /// Maximum log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for LinksquashConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            privacy_path: DEFAULT_PRIVACY_PATH.to_string(),
            export_file_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            log_level: "debug".to_string(),
        }
    }
}

impl LinksquashConfig {
    /// Load from JSON text; fields not present keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::ZeroDebounce);
        }
        if !self.privacy_path.starts_with('/') || self.privacy_path == "/" {
            return Err(ConfigError::InvalidPrivacyPath(self.privacy_path.clone()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("storageKey must not be empty")]
    EmptyStorageKey,

    #[error("debounceMs must be greater than zero")]
    ZeroDebounce,

    #[error("privacyPath must be an absolute path other than '/': {0}")]
    InvalidPrivacyPath(String),
}
