//! Server errors.

use std::io;

use peridot_config::ConfigError;
use peridot_core::LifecycleError;
use peridot_router::RouteError;
use thiserror::Error;

/// Errors raised while building or running an application.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A settings accessor or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The routes cannot be flattened.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// A startup hook or lifespan failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The OpenAPI document cannot be serialized.
    #[error("failed to render OpenAPI document: {0}")]
    OpenApi(#[from] serde_json::Error),

    /// The host and port do not resolve to an address.
    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    /// The listener cannot be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
