//! Body reading errors.
//!
//! Only the readers fail; decoding an already-read form never does.

use http::StatusCode;
use thiserror::Error;

/// Errors raised while reading a form body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The request has no `Content-Type`.
    #[error("missing content type: expected {expected}")]
    MissingContentType {
        /// What the reader accepts.
        expected: &'static str,
    },

    /// The content type is not a form encoding.
    #[error("unsupported content type `{actual}`")]
    UnsupportedMediaType {
        /// The received content type.
        actual: String,
    },

    /// The multipart boundary is missing or invalid.
    #[error("invalid multipart boundary: {0}")]
    InvalidBoundary(String),

    /// The body or a field exceeds its size limit.
    #[error("payload too large: max {max} bytes, got {actual} bytes")]
    PayloadTooLarge {
        /// Limit in bytes.
        max: usize,
        /// Received size in bytes.
        actual: usize,
    },

    /// More fields than allowed.
    #[error("too many form fields (max {max})")]
    TooManyFields {
        /// Field limit.
        max: usize,
    },

    /// The body cannot be parsed.
    #[error("malformed form body: {0}")]
    Malformed(String),

    /// A text field is not valid UTF-8.
    #[error("form field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        /// Field name.
        field: String,
    },

    /// An uploaded file fails a check.
    #[error("invalid upload `{field}`: {message}")]
    Validation {
        /// What was checked.
        field: String,
        /// Why it failed.
        message: String,
    },
}

impl ExtractionError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingContentType { .. } | Self::UnsupportedMediaType { .. } => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidBoundary(_)
            | Self::TooManyFields { .. }
            | Self::Malformed(_)
            | Self::InvalidUtf8 { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingContentType { .. } | Self::UnsupportedMediaType { .. } => {
                "UNSUPPORTED_MEDIA_TYPE"
            }
            Self::InvalidBoundary(_) => "INVALID_BOUNDARY",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::TooManyFields { .. } => "TOO_MANY_FIELDS",
            Self::Malformed(_) => "MALFORMED_BODY",
            Self::InvalidUtf8 { .. } => "INVALID_UTF8",
            Self::Validation { .. } => "VALIDATION_FAILED",
        }
    }

    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
