//! Errors raised while reading, writing or validating a `CanvasConfig`.

use std::io;
use thiserror::Error;

/// Settings failure.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// `key` is the dotted path of the offending field, e.g. `drag.settle_ms`.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SettingsError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        SettingsError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Problems with the config file itself rather than its values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Extension other than `.json` or `.toml`.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::invalid("drag.settle_ms", "must be > 0");
        assert_eq!(err.to_string(), "Invalid setting 'drag.settle_ms': must be > 0");

        let err = SettingsError::ConfigDirectory("permission denied".to_string());
        assert_eq!(err.to_string(), "Config directory error: permission denied");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnsupportedFormat("yaml".to_string());
        assert_eq!(err.to_string(), "Unsupported config format: yaml");

        let err: SettingsError = err.into();
        assert!(err.to_string().contains("yaml"));
    }
}
