//! # Peridot Telemetry
//!
//! Log output for Peridot services. Every crate emits `tracing` events;
//! this crate installs the subscriber that prints them.
//!
//! ```rust,no_run
//! use peridot_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development().level("peridot=trace,info"))?;
//! tracing::info!("ready");
//! # Ok::<(), peridot_telemetry::TelemetryError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/peridot-telemetry/0.1.0")]

mod error;
mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
