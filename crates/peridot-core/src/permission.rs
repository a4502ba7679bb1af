//! Permission checks evaluated before a handler runs.
//!
//! Application-level permissions are checked first, then the permissions
//! collected from every `Include` down to the route. The first denial wins
//! and the request is answered with `403 Forbidden`.

use std::sync::Arc;

use crate::Request;

/// An ordered list of permissions.
pub type PermissionStack = Vec<Arc<dyn Permission>>;

/// Decides whether a request may reach its handler.
pub trait Permission: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` when the request is allowed.
    fn has_permission(&self, request: &Request) -> bool;
}

/// Allows every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAny;

impl Permission for AllowAny {
    fn name(&self) -> &'static str {
        "allow_any"
    }

    fn has_permission(&self, _request: &Request) -> bool {
        true
    }
}

/// Denies every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Permission for DenyAll {
    fn name(&self) -> &'static str {
        "deny_all"
    }

    fn has_permission(&self, _request: &Request) -> bool {
        false
    }
}

/// Returns the name of the first permission that denies `request`.
pub fn first_denial<'a, I>(permissions: I, request: &Request) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a Arc<dyn Permission>>,
{
    permissions
        .into_iter()
        .find(|permission| !permission.has_permission(request))
        .map(|permission| permission.name())
}
