//! Directive errors.

use peridot_config::ConfigError;
use peridot_server::ServerError;
use peridot_telemetry::TelemetryError;
use thiserror::Error;

/// Error type for directives.
#[derive(Error, Debug)]
pub enum DirectiveError {
    /// Neither `--app` nor `PERIDOT_DEFAULT_APP` was given.
    #[error(
        "You cannot specify a custom directive without specifying the --app or setting \
         PERIDOT_DEFAULT_APP environment variable."
    )]
    MissingApp,

    /// The named application is not registered.
    #[error("unknown application `{name}` (registered: {})", .known.join(", "))]
    UnknownApp {
        /// Requested name.
        name: String,
        /// Registered names.
        known: Vec<String>,
    },

    /// Settings could not be loaded or evaluated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The application could not be built or served.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Logging could not be set up.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl DirectiveError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingApp | Self::UnknownApp { .. } => 1,
            Self::Config(_) | Self::Telemetry(_) => 2,
            Self::Server(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_app_message() {
        assert_eq!(
            DirectiveError::MissingApp.to_string(),
            "You cannot specify a custom directive without specifying the --app or setting \
             PERIDOT_DEFAULT_APP environment variable."
        );
        assert_eq!(DirectiveError::MissingApp.exit_code(), 1);
    }

    #[test]
    fn test_unknown_app_lists_known() {
        let err = DirectiveError::UnknownApp {
            name: "shop".into(),
            known: vec!["blog".into(), "admin".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown application `shop` (registered: blog, admin)"
        );
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err = DirectiveError::from(ConfigError::missing_field("secret"));
        assert_eq!(
            err.to_string(),
            "improperly configured: `secret` setting not configured"
        );
        assert_eq!(err.exit_code(), 2);
    }
}
