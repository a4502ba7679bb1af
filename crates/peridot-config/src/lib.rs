//! # Peridot Config
//!
//! Application settings for the Peridot framework.
//!
//! [`Settings`] holds the stored settings and exposes every derived
//! configuration (CORS, CSRF, sessions, OpenAPI, middleware, lifecycle
//! hooks, ...) through accessors. Each accessor returns its override when
//! one is installed through [`SettingsOverrides`], and its default
//! otherwise. Defaults are absent except where a stored setting implies
//! otherwise:
//!
//! - `cors_config` is present exactly when `allow_origins` is non-empty
//! - `openapi_config` is always present
//! - `reload()` is true in development and testing
//!
//! [`SettingsLoader`] layers a TOML/JSON file and `PERIDOT__*` environment
//! variables over the defaults, and [`discover`] finds the file through
//! `PERIDOT_SETTINGS_MODULE`.
//!
//! ```rust
//! use peridot_config::{Environment, Settings};
//!
//! let settings = Settings {
//!     environment: Environment::Development,
//!     allow_origins: Some(vec!["https://app.example".into()]),
//!     ..Settings::default()
//! };
//!
//! assert!(settings.reload());
//! let cors = settings.cors_config().unwrap().unwrap();
//! assert_eq!(cors.allow_origins, vec!["https://app.example"]);
//! assert!(settings.session_config().unwrap().is_none());
//! ```

#![doc(html_root_url = "https://docs.rs/peridot-config/0.1.0")]

mod discovery;
mod error;
mod loader;
mod overrides;
mod resolved;
mod secret;
mod sections;
mod settings;
mod watcher;

pub use discovery::{
    discover, settings_path_from_env, DEFAULT_APP_ENV, ENV_PREFIX, SETTINGS_MODULE_ENV,
};
pub use error::ConfigError;
pub use loader::SettingsLoader;
pub use overrides::{Resolver, SettingsOverrides};
pub use resolved::ResolvedSettings;
pub use secret::Secret;
pub use sections::{
    AsyncExitConfig, Contact, CorsConfig, CsrfConfig, License, OpenApiConfig, SameSite,
    ServerInfo, SessionConfig, StaticFilesConfig, TemplateConfig, TemplateEngine,
};
pub use settings::{
    Environment, ResponseClass, ResponseCookie, Settings, DEFAULT_PASSWORD_HASHERS,
    OPENAPI_VERSION,
};
pub use watcher::{FileChangeEvent, FileChangeKind, FileWatcher, FileWatcherBuilder};
