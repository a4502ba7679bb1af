//! # Peridot
//!
//! **Settings-driven async web framework**
//!
//! - **Layered settings** – defaults, files, `.env` and environment
//!   overrides, with per-accessor overrides instead of subclassing
//! - **Form decoding** – url-encoded and multipart bodies into scalars,
//!   uploads and lists, with JSON-looking values decoded
//! - **Routing** – gateways and nested includes with typed path parameters
//! - **Server** – hyper-based HTTP/1.1 with lifespan hooks and graceful
//!   shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use peridot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = peridot::config::discover(None)?;
//!     let app = Application::builder(settings)
//!         .route(Gateway::post("/signup", Handler::new(|request: Request| async move {
//!             match FormData::from_request(&request).await {
//!                 Ok(form) => responses::json(&form.decode(TargetField::single())),
//!                 Err(e) => responses::error(e.status_code(), &e.to_string()),
//!             }
//!         })))
//!         .build()?;
//!
//!     Server::new(Arc::new(app), ServerConfig::default()).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/peridot/0.1.0")]

// Handlers, middleware, permissions, lifespan
pub use peridot_core as core;

// Settings
pub use peridot_config as config;

// Routing
pub use peridot_router as router;

// Form decoding
pub use peridot_extract as extract;

// Application and server
pub use peridot_server as server;

// Logging setup
pub use peridot_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use peridot::prelude::*;
///
/// let settings = Settings::default();
/// assert!(settings.cors_config().unwrap().is_none());
/// ```
pub mod prelude {
    pub use peridot_core::{
        responses, Dependencies, ExceptionHandler, Handler, Inject, LifespanHook, Middleware,
        Next, PathParams, Permission, Request, Response,
    };

    pub use peridot_config::{ConfigError, Environment, Settings, SettingsOverrides};

    pub use peridot_router::{Gateway, Include, Route};

    pub use peridot_extract::{
        decode_form, DecodedForm, ExtractionError, FieldShape, FormData, FormValue, TargetField,
        UploadFile,
    };

    pub use peridot_server::{Application, Server, ServerConfig, ShutdownSignal};

    pub use peridot_telemetry::{init_logging, LogConfig};
}
