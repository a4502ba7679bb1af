//! Application assembly and request dispatch.
//!
//! [`Application::builder`] evaluates every settings accessor before
//! anything else, so a misconfiguration is reported before a single route
//! is registered. The built [`Application`] is immutable apart from its
//! debug flag and is shared across connections behind an `Arc`.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{ALLOW, CONTENT_TYPE, HOST, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use indexmap::IndexMap;
use peridot_config::{
    AsyncExitConfig, ConfigError, CsrfConfig, ResolvedSettings, ResponseClass, SessionConfig,
    Settings, StaticFilesConfig, TemplateConfig,
};
use peridot_core::{
    exception, first_denial, responses, run_chain, Dependencies, ExceptionHandler,
    ExceptionHandlers, Inject, Lifecycle, Middleware, MiddlewareStack, Permission,
    PermissionStack, Request, Response,
};
use peridot_router::{Route, RouteMatch, RouteTable};

use crate::cors::Cors;
use crate::openapi::OpenApi;
use crate::ServerError;

/// Collects routes and application-level extensions on top of settings.
pub struct ApplicationBuilder {
    settings: Settings,
    routes: Vec<Route>,
    middleware: MiddlewareStack,
    permissions: PermissionStack,
    dependencies: Vec<(String, Inject)>,
    exception_handlers: ExceptionHandlers,
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("app_name", &self.settings.app_name)
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .field("permissions", &self.permissions.len())
            .finish_non_exhaustive()
    }
}

impl ApplicationBuilder {
    /// Adds a route after the routes from settings.
    #[must_use]
    pub fn route(mut self, route: impl Into<Route>) -> Self {
        self.routes.push(route.into());
        self
    }

    /// Adds several routes.
    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Appends a middleware after the ones from settings.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Appends an application-wide permission.
    #[must_use]
    pub fn permission(mut self, permission: Arc<dyn Permission>) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Registers a dependency, replacing one of the same name from settings.
    #[must_use]
    pub fn dependency(mut self, name: impl Into<String>, inject: Inject) -> Self {
        self.dependencies.push((name.into(), inject));
        self
    }

    /// Registers an exception handler for a status code.
    #[must_use]
    pub fn exception_handler(mut self, status: StatusCode, handler: ExceptionHandler) -> Self {
        self.exception_handlers.insert(status, handler);
        self
    }

    /// Evaluates the settings and assembles the application.
    pub fn build(self) -> Result<Application, ServerError> {
        let resolved = ResolvedSettings::resolve(&self.settings)?;
        self.settings.validate()?;

        let lifecycle = match resolved.lifespan {
            Some(factory) => Lifecycle::from_factory(factory),
            None => Lifecycle::from_hooks(resolved.on_startup, resolved.on_shutdown),
        };

        let mut routes = resolved.routes;
        routes.extend(self.routes);
        let routes = RouteTable::from_routes(routes)?;

        let openapi = match resolved.openapi.openapi_url() {
            Some(url) if self.settings.include_in_schema => {
                let document = OpenApi::build(&resolved.openapi, &routes);
                let body = Bytes::from(serde_json::to_vec(&document)?);
                Some(OpenApiEndpoint {
                    url,
                    document,
                    body,
                })
            }
            _ => None,
        };

        let cors = resolved.cors.map(Cors::new).transpose()?.map(Arc::new);
        let mut middleware: MiddlewareStack = Vec::new();
        if let Some(cors) = &cors {
            middleware.push(Arc::clone(cors) as Arc<dyn Middleware>);
        }
        middleware.extend(resolved.middleware);
        middleware.extend(self.middleware);

        let mut permissions = resolved.permissions;
        permissions.extend(self.permissions);

        let mut dependencies = resolved.dependencies;
        for (name, inject) in self.dependencies {
            dependencies.insert(name, inject);
        }

        let mut exception_handlers = resolved.exception_handlers;
        exception_handlers.extend(self.exception_handlers);

        let defaults = ResponseDefaults::from_settings(&self.settings)?;

        tracing::info!(
            app = %self.settings.app_name,
            routes = routes.len(),
            middleware = middleware.len(),
            "application assembled"
        );

        Ok(Application {
            debug: AtomicBool::new(self.settings.debug),
            settings: self.settings,
            routes,
            middleware,
            permissions,
            dependencies: Arc::new(dependencies),
            exception_handlers,
            lifecycle,
            cors,
            openapi,
            defaults,
            password_hashers: resolved.password_hashers,
            csrf: resolved.csrf,
            session: resolved.session,
            templates: resolved.templates,
            static_files: resolved.static_files,
            scheduler_tasks: resolved.scheduler_tasks,
            async_exit: resolved.async_exit,
        })
    }
}

struct OpenApiEndpoint {
    url: String,
    document: OpenApi,
    body: Bytes,
}

/// Headers, cookies and content type applied to every response.
struct ResponseDefaults {
    headers: HeaderMap,
    cookies: Vec<HeaderValue>,
    content_type: Option<HeaderValue>,
}

impl ResponseDefaults {
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &settings.response_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::invalid_value("response_headers", e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::invalid_value("response_headers", e.to_string()))?;
            headers.insert(name, value);
        }

        let cookies = settings
            .response_cookies
            .iter()
            .map(|cookie| {
                HeaderValue::from_str(&cookie.to_header_value())
                    .map_err(|e| ConfigError::invalid_value("response_cookies", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let content_type = settings
            .response_class
            .map(|class: ResponseClass| HeaderValue::from_static(class.content_type()));

        Ok(Self {
            headers,
            cookies,
            content_type,
        })
    }

    fn apply(&self, response: &mut Response) {
        let has_body = !response.body().is_empty();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        for cookie in &self.cookies {
            headers.append(SET_COOKIE, cookie.clone());
        }
        if let Some(content_type) = &self.content_type {
            if has_body && !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, content_type.clone());
            }
        }
    }
}

/// An assembled application.
pub struct Application {
    settings: Settings,
    routes: RouteTable,
    middleware: MiddlewareStack,
    permissions: PermissionStack,
    dependencies: Arc<Dependencies>,
    exception_handlers: ExceptionHandlers,
    lifecycle: Lifecycle,
    cors: Option<Arc<Cors>>,
    openapi: Option<OpenApiEndpoint>,
    defaults: ResponseDefaults,
    debug: AtomicBool,
    password_hashers: Vec<String>,
    csrf: Option<CsrfConfig>,
    session: Option<SessionConfig>,
    templates: Option<TemplateConfig>,
    static_files: Option<StaticFilesConfig>,
    scheduler_tasks: IndexMap<String, String>,
    async_exit: AsyncExitConfig,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("app_name", &self.settings.app_name)
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .field("lifecycle", &self.lifecycle)
            .field("debug", &self.is_debug())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Starts assembling an application from `settings`.
    pub fn builder(settings: Settings) -> ApplicationBuilder {
        ApplicationBuilder {
            settings,
            routes: Vec::new(),
            middleware: Vec::new(),
            permissions: Vec::new(),
            dependencies: Vec::new(),
            exception_handlers: ExceptionHandlers::new(),
        }
    }

    /// The settings the application was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The flattened routes.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Startup and shutdown hooks.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// The dependency registry handed to handlers.
    pub fn dependencies(&self) -> &Arc<Dependencies> {
        &self.dependencies
    }

    /// The OpenAPI document, when schema generation is enabled.
    pub fn openapi(&self) -> Option<&OpenApi> {
        self.openapi.as_ref().map(|endpoint| &endpoint.document)
    }

    /// The CORS policy, when configured.
    pub fn cors(&self) -> Option<&Cors> {
        self.cors.as_deref()
    }

    /// Password hasher names, strongest first.
    pub fn password_hashers(&self) -> &[String] {
        &self.password_hashers
    }

    /// CSRF configuration.
    pub fn csrf_config(&self) -> Option<&CsrfConfig> {
        self.csrf.as_ref()
    }

    /// Session configuration.
    pub fn session_config(&self) -> Option<&SessionConfig> {
        self.session.as_ref()
    }

    /// Template configuration.
    pub fn template_config(&self) -> Option<&TemplateConfig> {
        self.templates.as_ref()
    }

    /// Static files configuration.
    pub fn static_files_config(&self) -> Option<&StaticFilesConfig> {
        self.static_files.as_ref()
    }

    /// Scheduler tasks by name.
    pub fn scheduler_tasks(&self) -> &IndexMap<String, String> {
        &self.scheduler_tasks
    }

    /// Async exit stack configuration.
    pub fn async_exit_config(&self) -> &AsyncExitConfig {
        &self.async_exit
    }

    /// Debug mode. Panicking handlers report the panic message when set.
    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Switches debug mode.
    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    /// Dispatches one request.
    pub async fn handle(&self, request: Request) -> Response {
        let response = self.dispatch(request).await;
        let mut response = exception::apply(&self.exception_handlers, response);
        self.defaults.apply(&mut response);
        response
    }

    async fn dispatch(&self, mut request: Request) -> Response {
        if !self.is_host_allowed(&request) {
            tracing::debug!("rejected request for untrusted host");
            return responses::error(StatusCode::BAD_REQUEST, "Invalid host header");
        }

        let path = self.route_path(request.uri().path()).to_string();

        if let Some(endpoint) = &self.openapi {
            if path == endpoint.url && matches!(*request.method(), Method::GET | Method::HEAD) {
                return responses::with_body(
                    StatusCode::OK,
                    responses::APPLICATION_JSON,
                    endpoint.body.clone(),
                );
            }
        }

        if let Some(preflight) = self.cors.as_ref().and_then(|cors| cors.preflight(&request)) {
            return preflight;
        }

        let (entry, params) = match self.routes.match_route(request.method(), &path) {
            RouteMatch::Found { entry, params } => (entry, params),
            RouteMatch::MethodNotAllowed { allowed } => {
                let mut response =
                    responses::error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
                return response;
            }
            RouteMatch::NotFound => {
                tracing::debug!(%path, "no route");
                return responses::error(StatusCode::NOT_FOUND, "Not Found");
            }
        };

        if let Some(denied_by) =
            first_denial(self.permissions.iter().chain(entry.permissions()), &request)
        {
            tracing::debug!(%path, permission = denied_by, "permission denied");
            return responses::error(
                StatusCode::FORBIDDEN,
                "You do not have permission to perform this action.",
            );
        }

        tracing::debug!(method = %request.method(), %path, route = entry.path(), "dispatching");
        request.extensions_mut().insert(params);
        request
            .extensions_mut()
            .insert(Arc::clone(&self.dependencies));

        let stacks = [self.middleware.as_slice(), entry.middleware().as_slice()];
        let call = run_chain(&stacks, entry.handler(), request);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(%path, panic = %message, "handler panicked");
                let detail = if self.is_debug() {
                    message
                } else {
                    "Internal Server Error".to_string()
                };
                responses::error(StatusCode::INTERNAL_SERVER_ERROR, &detail)
            }
        }
    }

    fn route_path<'p>(&self, path: &'p str) -> &'p str {
        let root = self.settings.root_path.trim_end_matches('/');
        if root.is_empty() {
            return path;
        }
        match path.strip_prefix(root) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }

    fn is_host_allowed(&self, request: &Request) -> bool {
        let allowed = &self.settings.allowed_hosts;
        if allowed.iter().any(|host| host == "*") {
            return true;
        }

        let host = request
            .headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| request.uri().host());
        let Some(host) = host.map(|host| strip_port(host).to_ascii_lowercase()) else {
            return false;
        };

        allowed.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_prefix("*.") {
                Some(domain) => host
                    .strip_suffix(domain)
                    .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
                None => pattern == host,
            }
        })
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.split(':').next().unwrap_or(host)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8000"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8000"), "[::1]");
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }

    #[test]
    fn test_response_defaults() {
        let mut settings = Settings {
            response_class: Some(ResponseClass::Html),
            ..Settings::default()
        };
        settings
            .response_headers
            .insert("x-frame-options".into(), "DENY".into());
        settings
            .response_cookies
            .push(peridot_config::ResponseCookie::new("theme", "dark"));
        let defaults = ResponseDefaults::from_settings(&settings).unwrap();

        let mut response = Response::new(Bytes::from_static(b"<p>hi</p>"));
        defaults.apply(&mut response);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(
            response.headers()[SET_COOKIE],
            "theme=dark; Path=/; SameSite=Lax"
        );
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            ResponseClass::Html.content_type()
        );

        let mut empty = Response::new(Bytes::new());
        defaults.apply(&mut empty);
        assert!(empty.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_invalid_response_header_is_rejected() {
        let mut settings = Settings::default();
        settings
            .response_headers
            .insert("bad header".into(), "x".into());
        assert!(matches!(
            ResponseDefaults::from_settings(&settings),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
