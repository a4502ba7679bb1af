//! Route table errors.

use thiserror::Error;

/// Errors raised while building a route table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The path template cannot be parsed.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath {
        /// Offending template.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two routes answer the same method on the same path.
    #[error("route conflict: {method} {path} is already registered")]
    Conflict {
        /// HTTP method.
        method: String,
        /// Joined path template.
        path: String,
    },

    /// A gateway declares no methods.
    #[error("route `{path}` declares no methods")]
    NoMethods {
        /// Joined path template.
        path: String,
    },
}

impl RouteError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
