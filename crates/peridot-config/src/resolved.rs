//! Startup evaluation of every settings accessor.

use std::fmt;

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

/// The value of every accessor, computed once.
///
/// Evaluation stops at the first accessor that fails, so a configuration
/// error surfaces before anything is built from the settings.
pub struct ResolvedSettings {
    /// [`Settings::password_hashers`]
    pub password_hashers: Vec<String>,
    /// [`Settings::routes`]
    pub routes: Vec<Route>,
    /// [`Settings::csrf_config`]
    pub csrf: Option<CsrfConfig>,
    /// [`Settings::async_exit_config`]
    pub async_exit: AsyncExitConfig,
    /// [`Settings::template_config`]
    pub templates: Option<TemplateConfig>,
    /// [`Settings::static_files_config`]
    pub static_files: Option<StaticFilesConfig>,
    /// [`Settings::cors_config`]
    pub cors: Option<CorsConfig>,
    /// [`Settings::session_config`]
    pub session: Option<SessionConfig>,
    /// [`Settings::openapi_config`]
    pub openapi: OpenApiConfig,
    /// [`Settings::middleware`]
    pub middleware: MiddlewareStack,
    /// [`Settings::scheduler_tasks`]
    pub scheduler_tasks: IndexMap<String, String>,
    /// [`Settings::permissions`]
    pub permissions: PermissionStack,
    /// [`Settings::dependencies`]
    pub dependencies: Dependencies,
    /// [`Settings::exception_handlers`]
    pub exception_handlers: ExceptionHandlers,
    /// [`Settings::on_startup`]
    pub on_startup: Vec<LifespanHook>,
    /// [`Settings::on_shutdown`]
    pub on_shutdown: Vec<LifespanHook>,
    /// [`Settings::lifespan`]
    pub lifespan: Option<LifespanFactory>,
}

impl ResolvedSettings {
    /// Evaluates every accessor of `settings`.
    ///
    /// A lifespan factory combined with startup or shutdown hooks is
    /// rejected: an application uses one or the other.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let resolved = Self {
            password_hashers: traced("password_hashers", settings.password_hashers())?,
            routes: traced("routes", settings.routes())?,
            csrf: traced("csrf_config", settings.csrf_config())?,
            async_exit: traced("async_exit_config", settings.async_exit_config())?,
            templates: traced("template_config", settings.template_config())?,
            static_files: traced("static_files_config", settings.static_files_config())?,
            cors: traced("cors_config", settings.cors_config())?,
            session: traced("session_config", settings.session_config())?,
            openapi: traced("openapi_config", settings.openapi_config())?,
            middleware: traced("middleware", settings.middleware())?.unwrap_or_default(),
            scheduler_tasks: traced("scheduler_tasks", settings.scheduler_tasks())?,
            permissions: traced("permissions", settings.permissions())?.unwrap_or_default(),
            dependencies: traced("dependencies", settings.dependencies())?.unwrap_or_default(),
            exception_handlers: traced("exception_handlers", settings.exception_handlers())?
                .unwrap_or_default(),
            on_startup: traced("on_startup", settings.on_startup())?.unwrap_or_default(),
            on_shutdown: traced("on_shutdown", settings.on_shutdown())?.unwrap_or_default(),
            lifespan: traced("lifespan", settings.lifespan())?,
        };

        if resolved.lifespan.is_some()
            && (!resolved.on_startup.is_empty() || !resolved.on_shutdown.is_empty())
        {
            return Err(ConfigError::validation_error(
                "use either `lifespan` or `on_startup`/`on_shutdown`, not both",
            ));
        }

        Ok(resolved)
    }
}

fn traced<T>(accessor: &'static str, result: Result<T, ConfigError>) -> Result<T, ConfigError> {
    result.map_err(|e| {
        tracing::error!(accessor, error = %e, "settings accessor failed");
        e
    })
}

impl fmt::Debug for ResolvedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSettings")
            .field("password_hashers", &self.password_hashers)
            .field("routes", &self.routes.len())
            .field("csrf", &self.csrf)
            .field("cors", &self.cors)
            .field("session", &self.session)
            .field("openapi", &self.openapi)
            .field("middleware", &self.middleware.len())
            .field("permissions", &self.permissions.len())
            .field("dependencies", &self.dependencies)
            .field("exception_handlers", &self.exception_handlers.len())
            .field("on_startup", &self.on_startup.len())
            .field("on_shutdown", &self.on_shutdown.len())
            .field("lifespan", &self.lifespan.is_some())
            .finish_non_exhaustive()
    }
}
