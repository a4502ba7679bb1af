//! Per-accessor overrides.
//!
//! Every derived configuration on [`Settings`] can be replaced by a
//! resolver closure. The closure receives the settings so it can read
//! stored fields (the secret, the debug flag, ...) and may fail with a
//! [`ConfigError`] when a prerequisite is missing. A resolver must not call
//! the accessor it overrides.
//!
//! ```rust
//! use peridot_config::{ConfigError, SessionConfig, Settings, SettingsOverrides};
//!
//! let settings = Settings::default().with_overrides(SettingsOverrides::new().session_config(
//!     |settings| {
//!         if settings.secret.is_empty() {
//!             return Err(ConfigError::missing_field("secret"));
//!         }
//!         Ok(Some(SessionConfig::new(settings.secret.clone())))
//!     },
//! ));
//!
//! assert!(settings.session_config().unwrap().is_some());
//! assert!(settings.csrf_config().unwrap().is_none());
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use peridot_core::{
    Dependencies, ExceptionHandlers, LifespanFactory, LifespanHook, MiddlewareStack,
    PermissionStack,
};
use peridot_router::Route;

use crate::{
    AsyncExitConfig, ConfigError, CorsConfig, CsrfConfig, OpenApiConfig, SessionConfig, Settings,
    StaticFilesConfig, TemplateConfig,
};

/// A closure computing one derived configuration.
pub type Resolver<T> = Arc<dyn Fn(&Settings) -> Result<T, ConfigError> + Send + Sync>;

macro_rules! settings_overrides {
    ($( $(#[$doc:meta])* $field:ident: $ty:ty ),* $(,)?) => {
        /// Optional resolvers, one per derived configuration.
        #[derive(Clone, Default)]
        pub struct SettingsOverrides {
            $( pub(crate) $field: Option<Resolver<$ty>>, )*
        }

        impl SettingsOverrides {
            $(
                $(#[$doc])*
                #[must_use]
                pub fn $field<F>(mut self, resolver: F) -> Self
                where
                    F: Fn(&Settings) -> Result<$ty, ConfigError> + Send + Sync + 'static,
                {
                    self.$field = Some(Arc::new(resolver));
                    self
                }
            )*

            /// Names of the overridden accessors.
            pub fn overridden(&self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $( if self.$field.is_some() { names.push(stringify!($field)); } )*
                names
            }
        }
    };
}

settings_overrides! {
    /// Overrides [`Settings::password_hashers`].
    password_hashers: Vec<String>,
    /// Overrides [`Settings::routes`].
    routes: Vec<Route>,
    /// Overrides [`Settings::csrf_config`].
    csrf_config: Option<CsrfConfig>,
    /// Overrides [`Settings::async_exit_config`].
    async_exit_config: AsyncExitConfig,
    /// Overrides [`Settings::template_config`].
    template_config: Option<TemplateConfig>,
    /// Overrides [`Settings::static_files_config`].
    static_files_config: Option<StaticFilesConfig>,
    /// Overrides [`Settings::cors_config`].
    cors_config: Option<CorsConfig>,
    /// Overrides [`Settings::session_config`].
    session_config: Option<SessionConfig>,
    /// Overrides [`Settings::openapi_config`].
    openapi_config: OpenApiConfig,
    /// Overrides [`Settings::middleware`].
    middleware: Option<MiddlewareStack>,
    /// Overrides [`Settings::scheduler_tasks`].
    scheduler_tasks: IndexMap<String, String>,
    /// Overrides [`Settings::permissions`].
    permissions: Option<PermissionStack>,
    /// Overrides [`Settings::dependencies`].
    dependencies: Option<Dependencies>,
    /// Overrides [`Settings::exception_handlers`].
    exception_handlers: Option<ExceptionHandlers>,
    /// Overrides [`Settings::on_startup`].
    on_startup: Option<Vec<LifespanHook>>,
    /// Overrides [`Settings::on_shutdown`].
    on_shutdown: Option<Vec<LifespanHook>>,
    /// Overrides [`Settings::lifespan`].
    lifespan: Option<LifespanFactory>,
}

impl SettingsOverrides {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.overridden().is_empty()
    }
}

impl fmt::Debug for SettingsOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.overridden()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overridden_lists_set_resolvers() {
        let overrides = SettingsOverrides::new()
            .cors_config(|_| Ok(Some(CorsConfig::new(["*"]))))
            .password_hashers(|_| Ok(vec!["argon2".to_string()]));

        assert_eq!(overrides.overridden(), vec!["password_hashers", "cors_config"]);
        assert!(!overrides.is_empty());
        assert!(SettingsOverrides::new().is_empty());
    }

    #[test]
    fn test_debug_shows_names_only() {
        let overrides = SettingsOverrides::new().session_config(|_| Ok(None));
        assert_eq!(format!("{overrides:?}"), "{\"session_config\"}");
    }
}
