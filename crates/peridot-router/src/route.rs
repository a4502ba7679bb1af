//! Route declarations.

use std::fmt;
use std::sync::Arc;

use http::Method;
use peridot_core::{Handler, Middleware, MiddlewareStack, Permission, PermissionStack};

/// A node of the route tree.
#[derive(Clone)]
pub enum Route {
    /// A handler bound to a path.
    Gateway(Gateway),
    /// A group of routes under a prefix.
    Include(Include),
}

impl Route {
    /// The path declared on this node (not joined with any prefix).
    pub fn path(&self) -> &str {
        match self {
            Self::Gateway(gateway) => &gateway.path,
            Self::Include(include) => &include.path,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway(gateway) => gateway.fmt(f),
            Self::Include(include) => include.fmt(f),
        }
    }
}

impl From<Gateway> for Route {
    fn from(gateway: Gateway) -> Self {
        Self::Gateway(gateway)
    }
}

impl From<Include> for Route {
    fn from(include: Include) -> Self {
        Self::Include(include)
    }
}

/// Binds a path and a set of methods to a handler.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) path: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) handler: Handler,
    pub(crate) name: Option<String>,
    pub(crate) summary: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) include_in_schema: bool,
    pub(crate) permissions: PermissionStack,
    pub(crate) middleware: MiddlewareStack,
}

impl Gateway {
    /// A `GET` route.
    pub fn new(path: impl Into<String>, handler: Handler) -> Self {
        Self {
            path: path.into(),
            methods: vec![Method::GET],
            handler,
            name: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            include_in_schema: true,
            permissions: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Shortcut for a `GET` route.
    pub fn get(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, handler)
    }

    /// Shortcut for a `POST` route.
    pub fn post(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, handler).methods([Method::POST])
    }

    /// Shortcut for a `PUT` route.
    pub fn put(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, handler).methods([Method::PUT])
    }

    /// Shortcut for a `PATCH` route.
    pub fn patch(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, handler).methods([Method::PATCH])
    }

    /// Shortcut for a `DELETE` route.
    pub fn delete(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, handler).methods([Method::DELETE])
    }

    /// Replaces the accepted methods.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Route name, used for the OpenAPI operation id.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// One-line OpenAPI summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// OpenAPI description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// OpenAPI tags.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the route appears in the OpenAPI document.
    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    /// Adds a permission checked before the handler.
    #[must_use]
    pub fn permission(mut self, permission: Arc<dyn Permission>) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Adds route-level middleware.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("name", &self.name)
            .field("include_in_schema", &self.include_in_schema)
            .field("permissions", &self.permissions.len())
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Groups routes under a path prefix.
#[derive(Clone)]
pub struct Include {
    pub(crate) path: String,
    pub(crate) routes: Vec<Route>,
    pub(crate) name: Option<String>,
    pub(crate) include_in_schema: bool,
    pub(crate) permissions: PermissionStack,
    pub(crate) middleware: MiddlewareStack,
}

impl Include {
    /// Groups `routes` under `path`.
    pub fn new(path: impl Into<String>, routes: Vec<Route>) -> Self {
        Self {
            path: path.into(),
            routes,
            name: None,
            include_in_schema: true,
            permissions: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Namespace prefixed to the names of nested routes (`namespace:name`).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// When `false`, hides every nested route from the OpenAPI document.
    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    /// Adds a permission checked for every nested route.
    #[must_use]
    pub fn permission(mut self, permission: Arc<dyn Permission>) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Adds middleware wrapping every nested route.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Nested routes.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl fmt::Debug for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Include")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
