//! Request and response aliases shared by every layer.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use indexmap::IndexMap;

/// HTTP request with a fully buffered body.
pub type Request = http::Request<Bytes>;

/// HTTP response with a fully buffered body.
pub type Response = http::Response<Bytes>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Path parameters captured by the router, in template order.
///
/// The server stores them in the request extensions before the handler runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub IndexMap<String, String>);

impl PathParams {
    /// Returns the value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the number of captured parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
