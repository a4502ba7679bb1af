//! HTTP/1.1 server.
//!
//! The server runs the application's startup hooks, accepts connections
//! until the shutdown signal fires, waits a bounded time for open
//! connections to finish, then runs the shutdown hooks.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use peridot_core::{responses, Response};
use tokio::net::{TcpListener, TcpStream};

use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::{Application, ServerError};

/// Where and how to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Run the application's lifespan or startup/shutdown hooks.
    pub lifespan: bool,
    /// How long to wait for open connections on shutdown.
    pub shutdown_timeout: Duration,
    /// Largest request body read into memory, in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            lifespan: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port`.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Resolves the first socket address for the host.
    pub async fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let authority = self.authority();
        let first = tokio::net::lookup_host(authority.as_str())
            .await
            .map_err(|_| ServerError::InvalidAddress(authority.clone()))?
            .next();
        first.ok_or(ServerError::InvalidAddress(authority))
    }
}

/// Serves an [`Application`] over HTTP/1.1.
#[derive(Debug)]
pub struct Server {
    app: Arc<Application>,
    config: ServerConfig,
}

impl Server {
    /// A server for `app`.
    pub fn new(app: Arc<Application>, config: ServerConfig) -> Self {
        Self { app, config }
    }

    /// The served application.
    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().await?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.authority(),
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let lifecycle = self.app.lifecycle();
        let running = if self.config.lifespan {
            Some(lifecycle.startup().await?)
        } else {
            None
        };

        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "listening");

        let tracker = ConnectionTracker::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let guard = tracker.track();
                        let app = Arc::clone(&self.app);
                        let shutdown = shutdown.clone();
                        let limit = self.config.max_body_size;
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(app, stream, shutdown, limit).await {
                                tracing::debug!(%remote, error = %e, "connection error");
                            }
                            drop(guard);
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
                },
                () = shutdown.wait() => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        let open = tracker.active();
        if open > 0 {
            tracing::info!(open, "waiting for connections to close");
        }
        if tokio::time::timeout(self.config.shutdown_timeout, tracker.drained())
            .await
            .is_err()
        {
            tracing::warn!(open = tracker.active(), "shutdown timeout reached");
        }

        if let Some(running) = running {
            lifecycle.shutdown(running).await?;
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn serve_connection(
    app: Arc<Application>,
    stream: TcpStream,
    shutdown: ShutdownSignal,
    limit: usize,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Infallible>(handle(&app, request, limit).await) }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => result,
        () = shutdown.wait() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    }
}

async fn handle(
    app: &Application,
    request: hyper::Request<Incoming>,
    limit: usize,
) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    let response = match read_body(body, limit).await {
        Ok(body) => app.handle(http::Request::from_parts(parts, body)).await,
        Err(rejection) => rejection,
    };
    response.map(Full::new)
}

/// Buffers a request body of at most `limit` bytes.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, Response>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            tracing::debug!(limit, "request body too large");
            Err(responses::error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
            ))
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            Err(responses::error(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority() {
        let config = ServerConfig::default();
        assert_eq!(config.authority(), "localhost:8000");

        let v6 = ServerConfig {
            host: "::1".into(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(v6.authority(), "[::1]:9000");
    }

    #[tokio::test]
    async fn test_socket_addr_resolves_ip() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            ..ServerConfig::default()
        };
        let addr = config.socket_addr().await.unwrap();
        assert_eq!(addr.port(), 8080);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"name=peridot"));
        let bytes = read_body(body, 64).await.unwrap();
        assert_eq!(bytes.as_ref(), b"name=peridot");
    }

    #[tokio::test]
    async fn test_read_body_over_limit_is_413() {
        let body = Full::new(Bytes::from(vec![b'x'; 65]));
        let response = read_body(body, 64).await.unwrap_err();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.body().as_ref(),
            br#"{"detail":"Request body too large"}"#
        );
    }
}
