//! The application settings object.
//!
//! [`Settings`] holds the stored settings (what a settings file or the
//! environment can set) and exposes every derived configuration through an
//! accessor. Accessors return the override when one is installed and the
//! built-in default otherwise; defaults never fail.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use peridot_core::{
    Dependencies, ExceptionHandlers, LifespanFactory, LifespanHook, MiddlewareStack,
    PermissionStack,
};
use peridot_router::Route;
use serde::{Deserialize, Serialize};

use crate::overrides::Resolver;
use crate::{
    AsyncExitConfig, ConfigError, Contact, CorsConfig, CsrfConfig, License, OpenApiConfig,
    SameSite, Secret, ServerInfo, SessionConfig, SettingsOverrides, StaticFilesConfig,
    TemplateConfig,
};

/// Identifiers of the password hashers enabled by default, strongest first.
pub const DEFAULT_PASSWORD_HASHERS: [&str; 2] = ["pbkdf2_sha256", "pbkdf2_sha1"];

/// OpenAPI specification version of generated documents.
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    Development,
    /// Test runs.
    Testing,
    /// Production.
    #[default]
    Production,
}

impl Environment {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::invalid_value(
                "environment",
                format!("unknown environment `{other}`"),
            )),
        }
    }
}

/// Default response body type, used for the `Content-Type` of responses
/// that do not set one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    /// `application/json`
    Json,
    /// `text/html; charset=utf-8`
    Html,
    /// `text/plain; charset=utf-8`
    PlainText,
}

impl ResponseClass {
    /// The content type this class implies.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Html => "text/html; charset=utf-8",
            Self::PlainText => "text/plain; charset=utf-8",
        }
    }
}

/// A cookie set on every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseCookie {
    /// Cookie name.
    pub key: String,
    /// Cookie value.
    pub value: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub max_age: Option<u64>,
    /// Cookie path.
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Cookie domain.
    #[serde(default)]
    pub domain: Option<String>,
    /// Secure flag.
    #[serde(default)]
    pub secure: bool,
    /// HttpOnly flag.
    #[serde(default)]
    pub httponly: bool,
    /// SameSite policy.
    #[serde(default = "default_samesite")]
    pub samesite: SameSite,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_samesite() -> SameSite {
    SameSite::Lax
}

impl ResponseCookie {
    /// A cookie with default attributes.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            max_age: None,
            path: default_cookie_path(),
            domain: None,
            secure: false,
            httponly: false,
            samesite: default_samesite(),
        }
    }

    /// Renders the `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.key, self.value, self.path);
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &self.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.httponly {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.samesite.as_str());
        cookie
    }
}

/// Application settings.
///
/// Stored fields are public and loaded by [`crate::SettingsLoader`]; derived
/// configurations are read through the accessor methods and customised with
/// [`SettingsOverrides`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Debug mode.
    pub debug: bool,
    /// Deployment environment.
    pub environment: Environment,
    /// Application name.
    pub app_name: String,
    /// API title.
    pub title: String,
    /// API description.
    pub description: String,
    /// API contact.
    pub contact: Option<Contact>,
    /// Terms of service URL.
    pub terms_of_service: Option<String>,
    /// API license.
    pub license_info: Option<License>,
    /// Servers announced in the OpenAPI document.
    pub servers: Vec<ServerInfo>,
    /// Mount path of the documentation endpoints; `None` disables them.
    pub openapi_path: Option<String>,
    /// Application secret.
    pub secret: Secret,
    /// API version.
    pub version: String,
    /// Host names the application answers to. `*` allows any host.
    pub allowed_hosts: Vec<String>,
    /// Origins allowed by CORS. When set and non-empty, CORS is enabled.
    pub allow_origins: Option<Vec<String>>,
    /// Default response body type.
    pub response_class: Option<ResponseClass>,
    /// Cookies set on every response.
    pub response_cookies: Vec<ResponseCookie>,
    /// Headers added to every response that does not set them.
    pub response_headers: IndexMap<String, String>,
    /// Scheduler implementation identifier.
    pub scheduler_class: String,
    /// Whether the OpenAPI document is generated.
    pub include_in_schema: bool,
    /// OpenAPI tags.
    pub tags: Vec<String>,
    /// Time zone name.
    pub timezone: String,
    /// Whether timestamps are timezone-aware UTC.
    pub use_tz: bool,
    /// Path prefix the application is mounted under.
    pub root_path: String,
    /// Whether blocking handlers are allowed.
    pub enable_sync_handlers: bool,
    /// Whether the task scheduler starts with the application.
    pub enable_scheduler: bool,
    /// Accessor overrides, usually set with [`Settings::with_overrides`].
    #[serde(skip)]
    pub overrides: SettingsOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            environment: Environment::Production,
            app_name: "Peridot".to_string(),
            title: "My awesome Peridot application".to_string(),
            description:
                "Highly scalable, performant, easy to learn and for every application.".to_string(),
            contact: Some(Contact {
                name: Some("admin".to_string()),
                email: Some("admin@myapp.com".to_string()),
                url: None,
            }),
            terms_of_service: None,
            license_info: None,
            servers: Vec::new(),
            openapi_path: Some("docs".to_string()),
            secret: Secret::new("my secret"),
            version: env!("CARGO_PKG_VERSION").to_string(),
            allowed_hosts: vec!["*".to_string()],
            allow_origins: None,
            response_class: None,
            response_cookies: Vec::new(),
            response_headers: IndexMap::new(),
            scheduler_class: "tokio".to_string(),
            include_in_schema: true,
            tags: Vec::new(),
            timezone: "UTC".to_string(),
            use_tz: false,
            root_path: String::new(),
            enable_sync_handlers: true,
            enable_scheduler: false,
            overrides: SettingsOverrides::default(),
        }
    }
}

impl Settings {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs accessor overrides, replacing any installed before.
    #[must_use]
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Installed overrides.
    pub fn overrides(&self) -> &SettingsOverrides {
        &self.overrides
    }

    /// Whether code reloading is on: true in development and testing.
    pub fn reload(&self) -> bool {
        matches!(
            self.environment,
            Environment::Development | Environment::Testing
        )
    }

    /// Checks the stored fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::invalid_value("version", "must not be empty"));
        }
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("app_name", "must not be empty"));
        }
        if self.timezone.trim().is_empty() {
            return Err(ConfigError::invalid_value("timezone", "must not be empty"));
        }
        if let Some(path) = &self.openapi_path {
            if path.chars().any(char::is_whitespace) {
                return Err(ConfigError::invalid_value(
                    "openapi_path",
                    "must not contain whitespace",
                ));
            }
        }
        if !self.root_path.is_empty() && !self.root_path.starts_with('/') {
            return Err(ConfigError::invalid_value("root_path", "must start with `/`"));
        }
        Ok(())
    }

    fn resolve<T>(
        &self,
        resolver: Option<&Resolver<T>>,
        default: impl FnOnce(&Self) -> T,
    ) -> Result<T, ConfigError> {
        match resolver {
            Some(resolver) => resolver(self),
            None => Ok(default(self)),
        }
    }

    /// Password hasher identifiers, strongest first.
    pub fn password_hashers(&self) -> Result<Vec<String>, ConfigError> {
        self.resolve(self.overrides.password_hashers.as_ref(), |_| {
            DEFAULT_PASSWORD_HASHERS.iter().map(ToString::to_string).collect()
        })
    }

    /// Routes registered from settings. Empty by default.
    pub fn routes(&self) -> Result<Vec<Route>, ConfigError> {
        self.resolve(self.overrides.routes.as_ref(), |_| Vec::new())
    }

    /// CSRF protection. Off by default.
    pub fn csrf_config(&self) -> Result<Option<CsrfConfig>, ConfigError> {
        self.resolve(self.overrides.csrf_config.as_ref(), |_| None)
    }

    /// Async exit stack configuration.
    pub fn async_exit_config(&self) -> Result<AsyncExitConfig, ConfigError> {
        self.resolve(
            self.overrides.async_exit_config.as_ref(),
            |_| AsyncExitConfig::default(),
        )
    }

    /// Template configuration. Off by default.
    pub fn template_config(&self) -> Result<Option<TemplateConfig>, ConfigError> {
        self.resolve(self.overrides.template_config.as_ref(), |_| None)
    }

    /// Static files configuration. Off by default.
    pub fn static_files_config(&self) -> Result<Option<StaticFilesConfig>, ConfigError> {
        self.resolve(self.overrides.static_files_config.as_ref(), |_| None)
    }

    /// CORS policy: present exactly when `allow_origins` is non-empty.
    pub fn cors_config(&self) -> Result<Option<CorsConfig>, ConfigError> {
        self.resolve(self.overrides.cors_config.as_ref(), |settings| {
            settings
                .allow_origins
                .as_ref()
                .filter(|origins| !origins.is_empty())
                .map(|origins| CorsConfig::new(origins.iter().cloned()))
        })
    }

    /// Session configuration. Off by default.
    pub fn session_config(&self) -> Result<Option<SessionConfig>, ConfigError> {
        self.resolve(self.overrides.session_config.as_ref(), |_| None)
    }

    /// OpenAPI configuration, always present.
    pub fn openapi_config(&self) -> Result<OpenApiConfig, ConfigError> {
        self.resolve(self.overrides.openapi_config.as_ref(), |settings| OpenApiConfig {
            app_name: settings.app_name.clone(),
            title: settings.title.clone(),
            version: settings.version.clone(),
            description: Some(settings.description.clone()).filter(|d| !d.is_empty()),
            contact: settings.contact.clone(),
            terms_of_service: settings.terms_of_service.clone(),
            license: settings.license_info.clone(),
            servers: settings.servers.clone(),
            tags: settings.tags.clone(),
            path: settings.openapi_path.clone(),
            openapi_version: OPENAPI_VERSION.to_string(),
        })
    }

    /// Application middleware. None by default.
    pub fn middleware(&self) -> Result<Option<MiddlewareStack>, ConfigError> {
        self.resolve(self.overrides.middleware.as_ref(), |_| None)
    }

    /// Scheduled tasks: task name to task identifier. Empty by default.
    pub fn scheduler_tasks(&self) -> Result<IndexMap<String, String>, ConfigError> {
        self.resolve(self.overrides.scheduler_tasks.as_ref(), |_| IndexMap::new())
    }

    /// Application permissions. None by default.
    pub fn permissions(&self) -> Result<Option<PermissionStack>, ConfigError> {
        self.resolve(self.overrides.permissions.as_ref(), |_| None)
    }

    /// Application dependencies. None by default.
    pub fn dependencies(&self) -> Result<Option<Dependencies>, ConfigError> {
        self.resolve(self.overrides.dependencies.as_ref(), |_| None)
    }

    /// Exception handlers. None by default.
    pub fn exception_handlers(&self) -> Result<Option<ExceptionHandlers>, ConfigError> {
        self.resolve(self.overrides.exception_handlers.as_ref(), |_| None)
    }

    /// Startup hooks. None by default.
    pub fn on_startup(&self) -> Result<Option<Vec<LifespanHook>>, ConfigError> {
        self.resolve(self.overrides.on_startup.as_ref(), |_| None)
    }

    /// Shutdown hooks. None by default.
    pub fn on_shutdown(&self) -> Result<Option<Vec<LifespanHook>>, ConfigError> {
        self.resolve(self.overrides.on_shutdown.as_ref(), |_| None)
    }

    /// Lifespan context factory. None by default.
    pub fn lifespan(&self) -> Result<Option<LifespanFactory>, ConfigError> {
        self.resolve(self.overrides.lifespan.as_ref(), |_| None)
    }
}
