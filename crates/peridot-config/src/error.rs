//! Settings error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading settings or evaluating a settings accessor.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file not found.
    #[error("settings file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read the settings file.
    #[error("failed to read settings file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML settings: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("failed to parse JSON settings: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A setting holds a value it cannot take.
    #[error("invalid value for setting {field}: {reason}")]
    InvalidValue {
        /// Setting name.
        field: String,
        /// Why the value is rejected.
        reason: String,
    },

    /// A setting that a derived configuration depends on is not set.
    #[error("improperly configured: `{field}` setting not configured")]
    ImproperlyConfigured {
        /// Name of the missing setting.
        field: String,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// Variable name.
        var: String,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// Validation error after loading.
    #[error("settings validation failed: {0}")]
    ValidationError(String),

    /// The file watcher could not be set up.
    #[error("file watcher error: {message}")]
    Watch {
        /// Description of the failure.
        message: String,
    },
}

impl ConfigError {
    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an error for a prerequisite setting that is missing.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::ImproperlyConfigured {
            field: field.into(),
        }
    }

    /// Creates an environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}
