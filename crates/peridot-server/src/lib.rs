//! # Peridot Server
//!
//! Turns [`Settings`](peridot_config::Settings) and routes into a running
//! service.
//!
//! - [`Application`] evaluates the settings, flattens the routes and
//!   dispatches requests through hosts, CORS, routing, permissions,
//!   middleware and exception handlers
//! - [`Server`] serves an application over HTTP/1.1 with hyper and shuts
//!   down gracefully
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use peridot_config::Settings;
//! use peridot_core::{responses, Handler};
//! use peridot_router::Gateway;
//! use peridot_server::{Application, Server, ServerConfig};
//!
//! # async fn run() -> Result<(), peridot_server::ServerError> {
//! let app = Application::builder(Settings::default())
//!     .route(Gateway::get("/ping", Handler::new(|_| async { responses::text("pong") })))
//!     .build()?;
//!
//! Server::new(Arc::new(app), ServerConfig::default()).run().await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/peridot-server/0.1.0")]

mod application;
mod cors;
mod error;
pub mod openapi;
mod server;
mod shutdown;

pub use application::{Application, ApplicationBuilder};
pub use cors::Cors;
pub use error::ServerError;
pub use openapi::OpenApi;
pub use server::{Server, ServerConfig};
pub use shutdown::{ConnectionGuard, ConnectionTracker, ShutdownSignal};
