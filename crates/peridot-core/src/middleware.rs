//! Middleware trait and chain execution.
//!
//! Middleware wraps a handler: it receives the request and a [`Next`]
//! continuation, and either calls `next.run(request)` or answers itself.
//! Stacks are applied outermost first, so the first entry of a
//! [`MiddlewareStack`] sees the request first and the response last.
//!
//! # Example
//!
//! ```rust
//! use peridot_core::{BoxFuture, Middleware, Next, Request, Response};
//!
//! struct ServerHeader;
//!
//! impl Middleware for ServerHeader {
//!     fn name(&self) -> &'static str {
//!         "server-header"
//!     }
//!
//!     fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let mut response = next.run(request).await;
//!             response
//!                 .headers_mut()
//!                 .insert("server", http::HeaderValue::from_static("peridot"));
//!             response
//!         })
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::{BoxFuture, Handler, Request, Response};

/// An ordered list of middleware.
pub type MiddlewareStack = Vec<Arc<dyn Middleware>>;

/// A request/response interceptor.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by delegating to `next`.
    fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// Continuation to the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a Handler),
}

impl<'a> Next<'a> {
    fn handler(handler: &'a Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    fn chain(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Runs the remaining middleware and finally the handler.
    pub fn run(self, request: Request) -> BoxFuture<'a, Response> {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                tracing::trace!(middleware = middleware.name(), "entering middleware");
                middleware.process(request, *next)
            }
            NextInner::Handler(handler) => handler.call(request),
        }
    }
}

/// Runs `request` through each stack in turn, then `handler`.
///
/// Stacks are concatenated in the order given; pass the application stack
/// before the route stack.
pub fn run_chain<'a>(
    stacks: &[&'a [Arc<dyn Middleware>]],
    handler: &'a Handler,
    request: Request,
) -> BoxFuture<'a, Response> {
    let mut next = Next::handler(handler);
    for middleware in stacks.iter().rev().copied().flat_map(|stack| stack.iter().rev()) {
        next = Next::chain(middleware.as_ref(), next);
    }
    next.run(request)
}
