use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{BoxFuture, Request, Response};

/// A type-erased async request handler.
///
/// Cloning is cheap; all clones share the same function.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>,
}

impl Handler {
    /// Wraps an async function as a handler.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |request| Box::pin(f(request))),
        }
    }

    /// Invokes the handler.
    pub fn call(&self, request: Request) -> BoxFuture<'static, Response> {
        (self.inner)(request)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses;

    #[tokio::test]
    async fn test_handler_call() {
        let handler = Handler::new(|request: Request| async move {
            responses::text(format!("hello {}", request.uri().path()))
        });

        let response = handler.call(Request::new(bytes::Bytes::new())).await;
        assert_eq!(response.body().as_ref(), b"hello /");
    }

    #[tokio::test]
    async fn test_handler_clones_share_function() {
        let handler = Handler::new(|_| async { responses::text("shared") });
        let clone = handler.clone();

        let a = handler.call(Request::new(bytes::Bytes::new())).await;
        let b = clone.call(Request::new(bytes::Bytes::new())).await;
        assert_eq!(a.body(), b.body());
    }
}
