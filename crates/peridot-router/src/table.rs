//! Flattened route table.

use std::fmt;

use http::Method;
use peridot_core::{Handler, MiddlewareStack, PathParams, PermissionStack};

use crate::pattern::{join_paths, PathPattern};
use crate::route::{Gateway, Include, Route};
use crate::RouteError;

/// A gateway after flattening, with everything inherited from its includes.
#[derive(Clone)]
pub struct RouteEntry {
    pattern: PathPattern,
    methods: Vec<Method>,
    handler: Handler,
    name: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    include_in_schema: bool,
    permissions: PermissionStack,
    middleware: MiddlewareStack,
}

impl RouteEntry {
    /// Joined path template.
    pub fn path(&self) -> &str {
        self.pattern.template()
    }

    /// Parsed template.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Declared methods.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// The handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Namespaced route name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// OpenAPI summary.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// OpenAPI description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// OpenAPI tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// `false` when this route or any enclosing include opted out.
    pub fn include_in_schema(&self) -> bool {
        self.include_in_schema
    }

    /// Permissions, outermost include first.
    pub fn permissions(&self) -> &PermissionStack {
        &self.permissions
    }

    /// Middleware, outermost include first.
    pub fn middleware(&self) -> &MiddlewareStack {
        &self.middleware
    }

    fn accepts(&self, method: &Method) -> bool {
        self.methods.contains(method) || (*method == Method::HEAD && self.methods.contains(&Method::GET))
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("path", &self.path())
            .field("methods", &self.methods)
            .field("name", &self.name)
            .field("include_in_schema", &self.include_in_schema)
            .finish_non_exhaustive()
    }
}

/// Result of matching a request against the table.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// A route accepts the method and path.
    Found {
        /// The matched route.
        entry: &'a RouteEntry,
        /// Captured path parameters.
        params: PathParams,
    },
    /// The path exists but not for this method.
    MethodNotAllowed {
        /// Methods the path accepts.
        allowed: Vec<Method>,
    },
    /// No route has this path.
    NotFound,
}

/// Routes flattened in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

struct Scope {
    prefix: String,
    namespace: Option<String>,
    include_in_schema: bool,
    permissions: PermissionStack,
    middleware: MiddlewareStack,
}

impl RouteTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a route tree, depth first.
    pub fn from_routes(routes: Vec<Route>) -> Result<Self, RouteError> {
        let mut table = Self::new();
        let root = Scope {
            prefix: String::new(),
            namespace: None,
            include_in_schema: true,
            permissions: Vec::new(),
            middleware: Vec::new(),
        };
        table.flatten(&routes, &root)?;
        tracing::debug!(routes = table.entries.len(), "route table built");
        Ok(table)
    }

    fn flatten(&mut self, routes: &[Route], scope: &Scope) -> Result<(), RouteError> {
        for route in routes {
            if !route.path().starts_with('/') {
                return Err(RouteError::invalid_path(route.path(), "must start with `/`"));
            }
            match route {
                Route::Gateway(gateway) => self.register(gateway, scope)?,
                Route::Include(include) => {
                    let nested = Self::enter(include, scope);
                    self.flatten(&include.routes, &nested)?;
                }
            }
        }
        Ok(())
    }

    fn enter(include: &Include, scope: &Scope) -> Scope {
        Scope {
            prefix: join_paths(&scope.prefix, &include.path),
            namespace: qualify(scope.namespace.as_deref(), include.name.as_deref())
                .or_else(|| scope.namespace.clone()),
            include_in_schema: scope.include_in_schema && include.include_in_schema,
            permissions: scope
                .permissions
                .iter()
                .chain(&include.permissions)
                .cloned()
                .collect(),
            middleware: scope
                .middleware
                .iter()
                .chain(&include.middleware)
                .cloned()
                .collect(),
        }
    }

    fn register(&mut self, gateway: &Gateway, scope: &Scope) -> Result<(), RouteError> {
        let pattern = PathPattern::parse(&join_paths(&scope.prefix, &gateway.path))?;

        if gateway.methods.is_empty() {
            return Err(RouteError::NoMethods {
                path: pattern.template().to_string(),
            });
        }

        let shape = pattern.shape();
        for existing in self.entries.iter().filter(|e| e.pattern.shape() == shape) {
            if let Some(method) = gateway.methods.iter().find(|m| existing.methods.contains(*m)) {
                return Err(RouteError::Conflict {
                    method: method.to_string(),
                    path: pattern.template().to_string(),
                });
            }
        }

        self.entries.push(RouteEntry {
            pattern,
            methods: gateway.methods.clone(),
            handler: gateway.handler.clone(),
            name: qualify(scope.namespace.as_deref(), gateway.name.as_deref()),
            summary: gateway.summary.clone(),
            description: gateway.description.clone(),
            tags: gateway.tags.clone(),
            include_in_schema: scope.include_in_schema && gateway.include_in_schema,
            permissions: scope
                .permissions
                .iter()
                .chain(&gateway.permissions)
                .cloned()
                .collect(),
            middleware: scope
                .middleware
                .iter()
                .chain(&gateway.middleware)
                .cloned()
                .collect(),
        });
        Ok(())
    }

    /// Matches a method and path. The first matching route wins; `HEAD`
    /// is answered by `GET` routes.
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut allowed: Vec<Method> = Vec::new();

        for entry in &self.entries {
            let Some(params) = entry.pattern.matches(path) else {
                continue;
            };
            if entry.accepts(method) {
                return RouteMatch::Found {
                    entry,
                    params: params.into_iter().collect(),
                };
            }
            for m in &entry.methods {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            return RouteMatch::NotFound;
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        RouteMatch::MethodNotAllowed { allowed }
    }

    /// Looks up a route by its namespaced name.
    pub fn by_name(&self, name: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.name() == Some(name))
    }

    /// Routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no route is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `namespace:name`, or no name at all when `name` is unset.
fn qualify(namespace: Option<&str>, name: Option<&str>) -> Option<String> {
    let name = name?;
    Some(match namespace {
        Some(ns) => format!("{ns}:{name}"),
        None => name.to_string(),
    })
}
