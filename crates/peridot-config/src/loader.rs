//! Layered settings loader.
//!
//! Layers apply in order, later ones winning:
//! 1. Built-in defaults
//! 2. A settings file (TOML or JSON, chosen by extension)
//! 3. Environment variables named `PREFIX__FIELD`
//!
//! A file replaces the defaults as a whole; fields it leaves out keep
//! their default values. Environment variables then override single
//! fields.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, Environment, ResponseClass, Secret, Settings};

/// Builds [`Settings`] from defaults, a file and the environment.
///
/// ```no_run
/// use peridot_config::SettingsLoader;
///
/// # fn main() -> Result<(), peridot_config::ConfigError> {
/// let settings = SettingsLoader::new()
///     .with_file("settings.toml")?
///     .with_env_prefix("PERIDOT")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SettingsLoader {
    settings: Settings,
    env_prefix: Option<String>,
}

impl SettingsLoader {
    /// Starts from the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a settings file. The format follows the extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.settings = Self::parse_file(&content, path)?;
        tracing::debug!(path = %path.display(), "settings file loaded");
        Ok(self)
    }

    /// Loads a settings file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads settings from a string in the given format (`toml` or `json`).
    ///
    /// ```
    /// use peridot_config::SettingsLoader;
    ///
    /// let settings = SettingsLoader::new()
    ///     .with_string("debug = true\nallow_origins = [\"*\"]", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(settings.debug);
    /// assert!(settings.cors_config().unwrap().is_some());
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.settings = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported settings format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Reads a `.env` file from the working directory, if there is one.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), ".env loaded"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::validation_error(format!("invalid .env file: {e}"))),
        }
        Ok(self)
    }

    /// Applies environment overrides named `PREFIX__FIELD`, for example
    /// `PERIDOT__DEBUG=true` or `PERIDOT__ALLOW_ORIGINS=https://a.example,https://b.example`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies environment overrides and validates the result.
    pub fn load(mut self) -> Result<Settings, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix, env::vars())?;
        }
        self.settings.validate()?;
        Ok(self.settings)
    }

    /// Returns the settings without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> Settings {
        self.settings
    }

    fn parse_file(content: &str, path: &Path) -> Result<Settings, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported settings file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(field) = key.strip_prefix(&marker) {
                self.apply_env_var(&key, field, &value)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, field: &str, value: &str) -> Result<(), ConfigError> {
        let settings = &mut self.settings;
        match field {
            "DEBUG" => settings.debug = require_bool(key, value)?,
            "ENVIRONMENT" => {
                settings.environment = value
                    .parse::<Environment>()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected development, testing or production"))?;
            }
            "APP_NAME" => settings.app_name = value.to_string(),
            "TITLE" => settings.title = value.to_string(),
            "DESCRIPTION" => settings.description = value.to_string(),
            "TERMS_OF_SERVICE" => settings.terms_of_service = optional(value),
            "OPENAPI_PATH" => settings.openapi_path = optional(value),
            "SECRET" => settings.secret = Secret::new(value),
            "VERSION" => settings.version = value.to_string(),
            "ALLOWED_HOSTS" => settings.allowed_hosts = parse_list(value),
            "ALLOW_ORIGINS" => {
                settings.allow_origins = optional(value).map(|v| parse_list(&v));
            }
            "RESPONSE_CLASS" => {
                settings.response_class = match optional(value) {
                    None => None,
                    Some(class) => Some(parse_response_class(&class).ok_or_else(|| {
                        ConfigError::env_parse_error(key, "expected json, html or plain_text")
                    })?),
                };
            }
            "SCHEDULER_CLASS" => settings.scheduler_class = value.to_string(),
            "INCLUDE_IN_SCHEMA" => settings.include_in_schema = require_bool(key, value)?,
            "TAGS" => settings.tags = parse_list(value),
            "TIMEZONE" => settings.timezone = value.to_string(),
            "USE_TZ" => settings.use_tz = require_bool(key, value)?,
            "ROOT_PATH" => settings.root_path = value.to_string(),
            "ENABLE_SYNC_HANDLERS" => settings.enable_sync_handlers = require_bool(key, value)?,
            "ENABLE_SCHEDULER" => settings.enable_scheduler = require_bool(key, value)?,
            _ => return Err(ConfigError::env_parse_error(key, "unknown setting")),
        }
        tracing::debug!(var = key, "setting overridden from environment");
        Ok(())
    }
}

/// Parses a boolean: true/false, 1/0, yes/no, on/off.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn require_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_response_class(value: &str) -> Option<ResponseClass> {
    match value.to_lowercase().as_str() {
        "json" => Some(ResponseClass::Json),
        "html" => Some(ResponseClass::Html),
        "plain_text" | "text" => Some(ResponseClass::PlainText),
        _ => None,
    }
}
