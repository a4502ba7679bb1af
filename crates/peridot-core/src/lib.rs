//! # Peridot Core
//!
//! Shared building blocks of the Peridot framework: the request and
//! response types every layer agrees on, handlers, the middleware chain,
//! permissions, exception handlers, lifespan hooks and the named
//! dependency registry.
//!
//! Nothing in this crate performs I/O; the server crate drives these types.
//!
//! ## Example
//!
//! ```rust
//! use peridot_core::{responses, Handler};
//!
//! let handler = Handler::new(|_request| async { responses::text("pong") });
//! assert_eq!(format!("{handler:?}"), "Handler");
//! ```

#![doc(html_root_url = "https://docs.rs/peridot-core/0.1.0")]

pub mod di;
pub mod exception;
mod handler;
pub mod lifespan;
pub mod middleware;
pub mod permission;
pub mod responses;
mod types;

pub use di::{Dependencies, Inject, InjectionError};
pub use exception::{ExceptionHandler, ExceptionHandlers};
pub use handler::Handler;
pub use lifespan::{
    Lifecycle, LifecycleError, LifecycleResult, Lifespan, LifespanFactory, LifespanHook, Running,
};
pub use middleware::{run_chain, Middleware, MiddlewareStack, Next};
pub use permission::{first_denial, AllowAny, DenyAll, Permission, PermissionStack};
pub use types::{BoxFuture, PathParams, Request, Response};
