//! Locating the settings of a deployment.

use std::env;
use std::path::{Path, PathBuf};

use crate::{ConfigError, Settings, SettingsLoader};

/// Names the settings file to load.
pub const SETTINGS_MODULE_ENV: &str = "PERIDOT_SETTINGS_MODULE";

/// Names the application directives run against.
pub const DEFAULT_APP_ENV: &str = "PERIDOT_DEFAULT_APP";

/// Prefix of per-field environment overrides (`PERIDOT__DEBUG`, ...).
pub const ENV_PREFIX: &str = "PERIDOT";

/// The settings file named by [`SETTINGS_MODULE_ENV`], if set.
pub fn settings_path_from_env() -> Option<PathBuf> {
    env::var_os(SETTINGS_MODULE_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Loads the deployment's settings.
///
/// The file is `explicit` when given, otherwise the one named by
/// [`SETTINGS_MODULE_ENV`]; without either the defaults are used. A
/// `.env` file and `PERIDOT__*` overrides apply on top.
pub fn discover(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = explicit.map(Path::to_path_buf).or_else(settings_path_from_env);

    let mut loader = SettingsLoader::new().with_dotenv()?;
    if let Some(path) = &path {
        tracing::info!(path = %path.display(), "loading settings");
        loader = loader.with_file(path)?;
    } else {
        tracing::debug!("no settings file configured, using defaults");
    }

    loader.with_env_prefix(ENV_PREFIX).load()
}
