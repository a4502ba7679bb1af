//! Named application entry points.
//!
//! Directives locate the application they act on by name, either from
//! `--app` or the `PERIDOT_DEFAULT_APP` environment variable. A binary
//! registers its entry points up front:
//!
//! ```
//! use peridot_cli::AppRegistry;
//! use peridot_server::Application;
//!
//! let registry = AppRegistry::new().register("blog", Application::builder);
//! assert!(registry.contains("blog"));
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use peridot_config::Settings;
use peridot_server::{Application, ApplicationBuilder};

use crate::DirectiveError;

/// Produces an application builder from loaded settings.
pub type AppFactory = Arc<dyn Fn(Settings) -> ApplicationBuilder + Send + Sync>;

/// Application entry points by name.
#[derive(Clone, Default)]
pub struct AppRegistry {
    apps: IndexMap<String, AppFactory>,
}

impl fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRegistry")
            .field("apps", &self.apps.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AppRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Settings) -> ApplicationBuilder + Send + Sync + 'static,
    {
        self.apps.insert(name.into(), Arc::new(factory));
        self
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.apps.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }

    /// The factory registered under `name`.
    pub fn get(&self, name: &str) -> Result<&AppFactory, DirectiveError> {
        self.apps
            .get(name)
            .ok_or_else(|| DirectiveError::UnknownApp {
                name: name.to_string(),
                known: self.names().map(str::to_string).collect(),
            })
    }

    /// Builds the application registered under `name`.
    pub fn build(&self, name: &str, settings: Settings) -> Result<Application, DirectiveError> {
        let factory = self.get(name)?;
        Ok(factory(settings).build()?)
    }
}
