//! Small response builders used by handlers and framework error paths.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;

use crate::Response;

/// Content type for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Content type for plain text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Builds a response with the given status, content type and body.
pub fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// `200 OK` with a plain text body.
pub fn text(body: impl Into<String>) -> Response {
    with_body(StatusCode::OK, TEXT_PLAIN, body.into())
}

/// `200 OK` with `value` serialized as JSON.
///
/// A value that fails to serialize produces a `500` instead.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Response {
    json_with_status(StatusCode::OK, value)
}

/// JSON response with an explicit status.
pub fn json_with_status<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, APPLICATION_JSON, body),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            error(StatusCode::INTERNAL_SERVER_ERROR, "response serialization failed")
        }
    }
}

/// Framework error response: `{"detail": "..."}` with the given status.
pub fn error(status: StatusCode, detail: &str) -> Response {
    let body = serde_json::json!({ "detail": detail });
    with_body(status, APPLICATION_JSON, body.to_string())
}

/// Empty response with the given status.
pub fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}
