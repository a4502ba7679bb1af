//! Exception handlers keyed by response status.
//!
//! When dispatch produces a response whose status has a registered
//! handler (a framework 404, a 403 from a permission, a handler's own
//! 422), the handler receives that response and returns the one sent to
//! the client.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use indexmap::IndexMap;

use crate::Response;

/// Mapping from status code to handler, in registration order.
pub type ExceptionHandlers = IndexMap<StatusCode, ExceptionHandler>;

/// Rewrites an error response.
#[derive(Clone)]
pub struct ExceptionHandler {
    inner: Arc<dyn Fn(Response) -> Response + Send + Sync>,
}

impl ExceptionHandler {
    /// Wraps a rewrite function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Response) -> Response + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Applies the handler.
    pub fn handle(&self, response: Response) -> Response {
        (self.inner)(response)
    }
}

impl fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExceptionHandler")
    }
}

/// Applies the handler registered for the response status, if any.
pub fn apply(handlers: &ExceptionHandlers, response: Response) -> Response {
    match handlers.get(&response.status()) {
        Some(handler) => {
            tracing::debug!(status = %response.status(), "applying exception handler");
            handler.handle(response)
        }
        None => response,
    }
}
