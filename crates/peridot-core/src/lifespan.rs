//! Startup and shutdown hooks, and lifespan contexts.
//!
//! An application uses either a lifespan factory or plain hook lists,
//! never both:
//!
//! - **Hooks**: startup hooks run in registration order before the server
//!   accepts connections; shutdown hooks run in reverse order after it
//!   stops. A failing startup hook stops the sequence; shutdown runs every
//!   hook and reports the failures together.
//! - **Lifespan**: the factory produces a fresh [`Lifespan`] for each server
//!   run, whose `startup` and `shutdown` bracket the serving period.
//!
//! # Example
//!
//! ```rust
//! use peridot_core::{Lifecycle, LifespanHook};
//!
//! let lifecycle = Lifecycle::from_hooks(
//!     vec![LifespanHook::new("open-pool", || async { Ok(()) })],
//!     vec![LifespanHook::new("close-pool", || async { Ok(()) })],
//! );
//! assert_eq!(lifecycle.startup_hook_count(), 1);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::BoxFuture;

/// Error type for lifecycle failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A startup hook or lifespan startup failed.
    #[error("startup hook `{hook}` failed: {message}")]
    StartupFailed {
        /// Hook name.
        hook: String,
        /// Failure message.
        message: String,
    },

    /// One or more shutdown hooks failed.
    #[error("shutdown failed: {}", .0.join("; "))]
    ShutdownFailed(Vec<String>),

    /// Error raised from inside a hook.
    #[error("{message}")]
    Hook {
        /// Failure message.
        message: String,
        /// Optional source error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LifecycleError {
    /// Creates a hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Hook {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a hook error wrapping a source error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Hook {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for lifecycle hooks.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// A named async callback run at startup or shutdown.
#[derive(Clone)]
pub struct LifespanHook {
    name: String,
    hook: Arc<dyn Fn() -> BoxFuture<'static, LifecycleResult> + Send + Sync>,
}

impl LifespanHook {
    /// Creates a named hook.
    pub fn new<F, Fut>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            hook: Arc::new(move || Box::pin(hook())),
        }
    }

    /// Hook name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the hook.
    pub fn call(&self) -> BoxFuture<'static, LifecycleResult> {
        (self.hook)()
    }
}

impl fmt::Debug for LifespanHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifespanHook").field("name", &self.name).finish()
    }
}

/// A context entered when the server starts and exited when it stops.
pub trait Lifespan: Send + Sync {
    /// Called before the server accepts connections.
    fn startup(&self) -> BoxFuture<'_, LifecycleResult>;

    /// Called after the server stops accepting connections.
    fn shutdown(&self) -> BoxFuture<'_, LifecycleResult>;
}

/// Produces a fresh lifespan context for each server run.
pub type LifespanFactory = Arc<dyn Fn() -> Box<dyn Lifespan> + Send + Sync>;

/// Runs the startup and shutdown side of an application.
#[derive(Default)]
pub struct Lifecycle {
    startup_hooks: Vec<LifespanHook>,
    shutdown_hooks: Vec<LifespanHook>,
    factory: Option<LifespanFactory>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("startup_hooks", &self.startup_hooks.len())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .field("lifespan", &self.factory.is_some())
            .finish()
    }
}

impl Lifecycle {
    /// A lifecycle that does nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A lifecycle driven by hook lists.
    pub fn from_hooks(startup: Vec<LifespanHook>, shutdown: Vec<LifespanHook>) -> Self {
        Self {
            startup_hooks: startup,
            shutdown_hooks: shutdown,
            factory: None,
        }
    }

    /// A lifecycle driven by a lifespan factory.
    pub fn from_factory(factory: LifespanFactory) -> Self {
        Self {
            startup_hooks: Vec::new(),
            shutdown_hooks: Vec::new(),
            factory: Some(factory),
        }
    }

    /// Number of startup hooks.
    pub fn startup_hook_count(&self) -> usize {
        self.startup_hooks.len()
    }

    /// Number of shutdown hooks.
    pub fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.len()
    }

    /// Returns `true` when a lifespan factory is configured.
    pub fn has_lifespan(&self) -> bool {
        self.factory.is_some()
    }

    /// Runs startup and returns the guard that must be passed to
    /// [`Lifecycle::shutdown`].
    pub async fn startup(&self) -> LifecycleResult<Running> {
        if let Some(factory) = &self.factory {
            let context = factory();
            tracing::debug!("entering lifespan context");
            context.startup().await.map_err(|e| LifecycleError::StartupFailed {
                hook: "lifespan".to_string(),
                message: e.to_string(),
            })?;
            return Ok(Running {
                context: Some(context),
            });
        }

        for hook in &self.startup_hooks {
            tracing::debug!(hook = %hook.name(), "running startup hook");
            if let Err(e) = hook.call().await {
                tracing::error!(hook = %hook.name(), error = %e, "startup hook failed");
                return Err(LifecycleError::StartupFailed {
                    hook: hook.name().to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(Running { context: None })
    }

    /// Runs shutdown. Every hook runs even when an earlier one fails.
    pub async fn shutdown(&self, running: Running) -> LifecycleResult {
        let mut errors = Vec::new();

        if let Some(context) = running.context {
            tracing::debug!("exiting lifespan context");
            if let Err(e) = context.shutdown().await {
                errors.push(format!("lifespan: {e}"));
            }
        } else {
            for hook in self.shutdown_hooks.iter().rev() {
                tracing::debug!(hook = %hook.name(), "running shutdown hook");
                if let Err(e) = hook.call().await {
                    tracing::warn!(hook = %hook.name(), error = %e, "shutdown hook failed");
                    errors.push(format!("{}: {e}", hook.name()));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed(errors))
        }
    }
}

/// Proof that startup completed; holds the live lifespan context, if any.
pub struct Running {
    context: Option<Box<dyn Lifespan>>,
}

impl fmt::Debug for Running {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Running")
            .field("lifespan", &self.context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_hook(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> LifespanHook {
        let log = Arc::clone(log);
        LifespanHook::new(name, move || {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(name);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_hook_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::from_hooks(
            vec![recording_hook("start-a", &log), recording_hook("start-b", &log)],
            vec![recording_hook("stop-a", &log), recording_hook("stop-b", &log)],
        );

        let running = lifecycle.startup().await.unwrap();
        lifecycle.shutdown(running).await.unwrap();

        assert_eq!(*log.lock(), vec!["start-a", "start-b", "stop-b", "stop-a"]);
    }

    #[tokio::test]
    async fn test_startup_failure_stops_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::from_hooks(
            vec![
                LifespanHook::new("broken", || async { Err(LifecycleError::new("no database")) }),
                recording_hook("after", &log),
            ],
            Vec::new(),
        );

        let err = lifecycle.startup().await.unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("no database"));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_collects_errors_and_runs_all() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::from_hooks(
            Vec::new(),
            vec![
                recording_hook("first", &log),
                LifespanHook::new("failing", || async { Err(LifecycleError::new("boom")) }),
            ],
        );

        let running = lifecycle.startup().await.unwrap();
        let err = lifecycle.shutdown(running).await.unwrap_err();

        assert!(matches!(err, LifecycleError::ShutdownFailed(ref errors) if errors.len() == 1));
        assert_eq!(*log.lock(), vec!["first"]);
    }

    struct Recorded(Arc<Mutex<Vec<&'static str>>>);

    impl Lifespan for Recorded {
        fn startup(&self) -> BoxFuture<'_, LifecycleResult> {
            Box::pin(async move {
                self.0.lock().push("enter");
                Ok(())
            })
        }

        fn shutdown(&self) -> BoxFuture<'_, LifecycleResult> {
            Box::pin(async move {
                self.0.lock().push("exit");
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_lifespan_factory_brackets_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory_log = Arc::clone(&log);
        let factory: LifespanFactory =
            Arc::new(move || Box::new(Recorded(Arc::clone(&factory_log))) as Box<dyn Lifespan>);
        let lifecycle = Lifecycle::from_factory(factory);
        assert!(lifecycle.has_lifespan());

        let running = lifecycle.startup().await.unwrap();
        lifecycle.shutdown(running).await.unwrap();

        assert_eq!(*log.lock(), vec!["enter", "exit"]);
    }
}
