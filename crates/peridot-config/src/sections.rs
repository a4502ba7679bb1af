//! Value objects produced by the settings accessors.
//!
//! Each one is either absent or fully formed: constructors take every
//! required input and fill the rest with defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Secret;

/// Contact information published in the OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Contact {
    /// Contact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contact e-mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Contact URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// License information published in the OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct License {
    /// License name.
    pub name: String,
    /// License URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A server entry of the OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerInfo {
    /// Server URL.
    pub url: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorsConfig {
    /// Allowed origins, in the order given. `*` allows any origin.
    pub allow_origins: Vec<String>,
    /// Allowed methods. `*` allows any method.
    pub allow_methods: Vec<String>,
    /// Allowed request headers. `*` allows any header.
    pub allow_headers: Vec<String>,
    /// Whether credentials are allowed.
    pub allow_credentials: bool,
    /// Optional origin regular expression.
    pub allow_origin_regex: Option<String>,
    /// Response headers exposed to the browser.
    pub expose_headers: Vec<String>,
    /// Preflight cache duration in seconds.
    pub max_age: u64,
}

impl CorsConfig {
    /// A policy allowing `origins`, every method and every header.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_origins: origins.into_iter().map(Into::into).collect(),
            allow_methods: vec!["*".to_string()],
            allow_headers: vec!["*".to_string()],
            allow_credentials: false,
            allow_origin_regex: None,
            expose_headers: Vec::new(),
            max_age: 600,
        }
    }

    /// Returns `true` if any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }
}

/// Cross-site request forgery protection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrfConfig {
    /// Signing secret.
    pub secret: Secret,
    /// Cookie carrying the token.
    pub cookie_name: String,
    /// Header the client echoes the token in.
    pub header_name: String,
    /// Cookie path.
    pub cookie_path: String,
    /// Cookie domain.
    pub cookie_domain: Option<String>,
    /// Secure cookie flag.
    pub cookie_secure: bool,
    /// HttpOnly cookie flag.
    pub cookie_httponly: bool,
    /// SameSite policy.
    pub cookie_samesite: SameSite,
    /// Methods exempt from the check.
    pub safe_methods: Vec<String>,
}

impl CsrfConfig {
    /// CSRF protection signed with `secret`.
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: "csrftoken".to_string(),
            header_name: "X-CSRFToken".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_secure: false,
            cookie_httponly: false,
            cookie_samesite: SameSite::Lax,
            safe_methods: vec!["GET".to_string(), "HEAD".to_string()],
        }
    }
}

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=None`
    None,
}

impl SameSite {
    /// Attribute value as written in `Set-Cookie`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

/// Signed cookie sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    /// Signing key.
    pub secret_key: Secret,
    /// Cookie name.
    pub session_cookie: String,
    /// Cookie path.
    pub path: String,
    /// Lifetime in seconds.
    pub max_age: u64,
    /// Only send over HTTPS.
    pub https_only: bool,
    /// SameSite policy.
    pub same_site: SameSite,
}

impl SessionConfig {
    /// Sessions signed with `secret_key`, stored in the `session` cookie.
    pub fn new(secret_key: impl Into<Secret>) -> Self {
        Self {
            secret_key: secret_key.into(),
            session_cookie: "session".to_string(),
            path: "/".to_string(),
            max_age: 14 * 24 * 60 * 60,
            https_only: false,
            same_site: SameSite::Lax,
        }
    }

    /// Renames the session cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }
}

/// Template engine identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
    /// Jinja-style templates.
    Jinja,
    /// Mako-style templates.
    Mako,
}

/// Template lookup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateConfig {
    /// Directory holding the templates.
    pub directory: PathBuf,
    /// Engine used to render them.
    pub engine: TemplateEngine,
}

impl TemplateConfig {
    /// Jinja templates from `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            engine: TemplateEngine::Jinja,
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticFilesConfig {
    /// URL prefix.
    pub path: String,
    /// Directory on disk.
    pub directory: PathBuf,
    /// Serve `index.html` for directories.
    pub html: bool,
    /// Require the directory to exist at startup.
    pub check_dir: bool,
}

impl StaticFilesConfig {
    /// Serve `directory` under `path`.
    pub fn new(path: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            directory: directory.into(),
            html: false,
            check_dir: true,
        }
    }
}

/// OpenAPI document configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenApiConfig {
    /// Application name.
    pub app_name: String,
    /// Document title.
    pub title: String,
    /// API version.
    pub version: String,
    /// Description.
    pub description: Option<String>,
    /// Contact information.
    pub contact: Option<Contact>,
    /// Terms of service URL.
    pub terms_of_service: Option<String>,
    /// License information.
    pub license: Option<License>,
    /// Servers.
    pub servers: Vec<ServerInfo>,
    /// Tags.
    pub tags: Vec<String>,
    /// Mount path of the documentation endpoints; `None` disables them.
    pub path: Option<String>,
    /// OpenAPI specification version.
    pub openapi_version: String,
}

impl OpenApiConfig {
    /// URL of the JSON document, e.g. `/docs/openapi.json`.
    pub fn openapi_url(&self) -> Option<String> {
        self.path.as_ref().map(|path| {
            let trimmed = path.trim_matches('/');
            if trimmed.is_empty() {
                "/openapi.json".to_string()
            } else {
                format!("/{trimmed}/openapi.json")
            }
        })
    }
}

/// Async exit stack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsyncExitConfig {
    /// Request extension name the exit stack is stored under.
    pub context_name: String,
}

impl Default for AsyncExitConfig {
    fn default() -> Self {
        Self {
            context_name: "peridot_astack".to_string(),
        }
    }
}
