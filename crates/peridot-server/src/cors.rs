//! Cross-origin resource sharing.
//!
//! Preflight requests are answered by the application before routing;
//! [`Cors`] as a middleware decorates the responses of actual requests.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use peridot_config::{ConfigError, CorsConfig};
use peridot_core::{responses, BoxFuture, Middleware, Next, Request, Response};
use regex::Regex;

const ALL_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";

/// CORS policy enforcement.
#[derive(Debug)]
pub struct Cors {
    config: CorsConfig,
    origin_regex: Option<Regex>,
}

impl Cors {
    /// Compiles a policy. Fails on an invalid origin regex.
    pub fn new(config: CorsConfig) -> Result<Self, ConfigError> {
        let origin_regex = config
            .allow_origin_regex
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| ConfigError::invalid_value("allow_origin_regex", e.to_string()))
            })
            .transpose()?;
        Ok(Self {
            config,
            origin_regex,
        })
    }

    /// The policy.
    pub fn config(&self) -> &CorsConfig {
        &self.config
    }

    /// Returns `true` if `origin` may access the application.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.config.allows_any_origin()
            || self.config.allow_origins.iter().any(|o| o == origin)
            || self
                .origin_regex
                .as_ref()
                .is_some_and(|regex| regex.is_match(origin))
    }

    fn allows_any_method(&self) -> bool {
        self.config.allow_methods.iter().any(|m| m == "*")
    }

    fn allows_any_header(&self) -> bool {
        self.config.allow_headers.iter().any(|h| h == "*")
    }

    fn is_method_allowed(&self, method: &str) -> bool {
        self.allows_any_method()
            || self
                .config
                .allow_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Answers a preflight request. `None` for any other request.
    pub fn preflight(&self, request: &Request) -> Option<Response> {
        if request.method() != Method::OPTIONS {
            return None;
        }
        let headers = request.headers();
        let origin = header_str(headers, &ORIGIN)?;
        let requested_method = header_str(headers, &ACCESS_CONTROL_REQUEST_METHOD)?;

        let mut failures = Vec::new();
        if !self.is_origin_allowed(origin) {
            failures.push("origin");
        }
        if !self.is_method_allowed(requested_method) {
            failures.push("method");
        }
        let requested_headers = header_str(headers, &ACCESS_CONTROL_REQUEST_HEADERS);
        if let Some(requested) = requested_headers {
            if !self.allows_any_header() && !self.are_headers_allowed(requested) {
                failures.push("headers");
            }
        }

        if !failures.is_empty() {
            tracing::debug!(origin, ?failures, "rejected CORS preflight");
            return Some(responses::with_body(
                StatusCode::BAD_REQUEST,
                responses::TEXT_PLAIN,
                format!("Disallowed CORS {}", failures.join(", ")),
            ));
        }

        let mut response = responses::with_body(StatusCode::OK, responses::TEXT_PLAIN, "OK");
        let out = response.headers_mut();
        self.set_origin(out, origin);

        let methods = if self.allows_any_method() {
            ALL_METHODS.to_string()
        } else {
            self.config.allow_methods.join(", ")
        };
        insert(out, ACCESS_CONTROL_ALLOW_METHODS, &methods);

        if self.allows_any_header() {
            if let Some(requested) = requested_headers {
                insert(out, ACCESS_CONTROL_ALLOW_HEADERS, requested);
            }
        } else if !self.config.allow_headers.is_empty() {
            insert(
                out,
                ACCESS_CONTROL_ALLOW_HEADERS,
                &self.config.allow_headers.join(", "),
            );
        }
        insert(out, ACCESS_CONTROL_MAX_AGE, &self.config.max_age.to_string());
        Some(response)
    }

    fn are_headers_allowed(&self, requested: &str) -> bool {
        requested
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .all(|h| {
                self.config
                    .allow_headers
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(h))
            })
    }

    fn set_origin(&self, headers: &mut HeaderMap, origin: &str) {
        if self.config.allows_any_origin() && !self.config.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else {
            insert(headers, ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        if self.config.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}

impl Middleware for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        let origin = header_str(request.headers(), &ORIGIN)
            .filter(|origin| self.is_origin_allowed(origin))
            .map(str::to_string);

        Box::pin(async move {
            let mut response = next.run(request).await;
            if let Some(origin) = origin {
                let headers = response.headers_mut();
                self.set_origin(headers, &origin);
                if !self.config.expose_headers.is_empty() {
                    insert(
                        headers,
                        ACCESS_CONTROL_EXPOSE_HEADERS,
                        &self.config.expose_headers.join(", "),
                    );
                }
            }
            response
        })
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &http::HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn insert(headers: &mut HeaderMap, name: http::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "skipping invalid CORS header value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use peridot_core::{run_chain, Handler};
    use std::sync::Arc;

    fn preflight(origin: &str, method: &str) -> Request {
        http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/items")
            .header(ORIGIN, origin)
            .header(ACCESS_CONTROL_REQUEST_METHOD, method)
            .body(Bytes::new())
            .unwrap()
    }

    fn restricted() -> Cors {
        let mut config = CorsConfig::new(["https://app.example"]);
        config.allow_methods = vec!["GET".into(), "POST".into()];
        config.allow_headers = vec!["content-type".into()];
        Cors::new(config).unwrap()
    }

    #[test]
    fn test_preflight_allowed() {
        let cors = restricted();
        let response = cors.preflight(&preflight("https://app.example", "POST")).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST");
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "600");
        assert_eq!(headers[VARY], "Origin");
    }

    #[test]
    fn test_preflight_rejects_origin_and_method() {
        let cors = restricted();
        let response = cors.preflight(&preflight("https://evil.example", "DELETE")).unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().as_ref(), b"Disallowed CORS origin, method");
    }

    #[test]
    fn test_preflight_checks_headers() {
        let cors = restricted();
        let mut request = preflight("https://app.example", "GET");
        request.headers_mut().insert(
            ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("X-Custom"),
        );
        let response = cors.preflight(&request).unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_a_preflight() {
        let cors = restricted();
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/items")
            .body(Bytes::new())
            .unwrap();
        assert!(cors.preflight(&request).is_none());
    }

    #[test]
    fn test_wildcard_echoes_requested_headers() {
        let cors = Cors::new(CorsConfig::new(["*"])).unwrap();
        let mut request = preflight("https://any.example", "PATCH");
        request.headers_mut().insert(
            ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("x-token"),
        );
        let response = cors.preflight(&request).unwrap();
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], ALL_METHODS);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "x-token");
    }

    #[test]
    fn test_origin_regex() {
        let mut config = CorsConfig::new(Vec::<String>::new());
        config.allow_origin_regex = Some(r"https://.*\.example\.org".into());
        let cors = Cors::new(config).unwrap();
        assert!(cors.is_origin_allowed("https://api.example.org"));
        assert!(!cors.is_origin_allowed("https://api.example.org.evil"));

        let mut invalid = CorsConfig::new(Vec::<String>::new());
        invalid.allow_origin_regex = Some("(".into());
        assert!(Cors::new(invalid).is_err());
    }

    #[tokio::test]
    async fn test_middleware_decorates_allowed_origin() {
        let mut config = CorsConfig::new(["https://app.example"]);
        config.allow_credentials = true;
        config.expose_headers = vec!["x-total".into()];
        let stack: Vec<Arc<dyn Middleware>> = vec![Arc::new(Cors::new(config).unwrap())];
        let handler = Handler::new(|_| async { responses::text("ok") });

        let request = http::Request::builder()
            .uri("/")
            .header(ORIGIN, "https://app.example")
            .body(Bytes::new())
            .unwrap();
        let response = run_chain(&[stack.as_slice()], &handler, request).await;
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[ACCESS_CONTROL_EXPOSE_HEADERS], "x-total");

        let request = http::Request::builder()
            .uri("/")
            .header(ORIGIN, "https://other.example")
            .body(Bytes::new())
            .unwrap();
        let response = run_chain(&[stack.as_slice()], &handler, request).await;
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
