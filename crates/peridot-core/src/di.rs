//! Named dependency registry.
//!
//! Dependencies are registered under a name with a provider closure and
//! resolved by name and type inside handlers. The application places an
//! `Arc<Dependencies>` in every request's extensions.
//!
//! # Example
//!
//! ```rust
//! use peridot_core::{Dependencies, Inject};
//!
//! struct Pool {
//!     url: String,
//! }
//!
//! let deps = Dependencies::new()
//!     .with("pool", Inject::new(|| Pool { url: "postgres://localhost".into() }).cached());
//!
//! let pool = deps.resolve::<Pool>("pool").unwrap();
//! assert_eq!(pool.url, "postgres://localhost");
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

type Provided = Arc<dyn Any + Send + Sync>;

/// Error when a dependency cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// Nothing is registered under the name.
    #[error("dependency `{name}` is not registered")]
    NotRegistered {
        /// Requested name.
        name: String,
    },

    /// The provider produced a different type.
    #[error("dependency `{name}` is not a `{expected}`")]
    TypeMismatch {
        /// Requested name.
        name: String,
        /// Requested type.
        expected: &'static str,
    },
}

/// A dependency provider.
#[derive(Clone)]
pub struct Inject {
    provider: Arc<dyn Fn() -> Provided + Send + Sync>,
    use_cache: bool,
    cache: Arc<Mutex<Option<Provided>>>,
}

impl Inject {
    /// Provider that builds a new value on every resolution.
    pub fn new<T, F>(provider: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            provider: Arc::new(move || Arc::new(provider()) as Provided),
            use_cache: false,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Provider that always hands out the same instance.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        let value: Provided = Arc::new(value);
        Self {
            provider: Arc::new(move || Arc::clone(&value)),
            use_cache: false,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Builds the value once, on first resolution, and reuses it.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.use_cache = true;
        self
    }

    fn provide(&self) -> Provided {
        if !self.use_cache {
            return (self.provider)();
        }
        let mut cache = self.cache.lock();
        Arc::clone(cache.get_or_insert_with(|| (self.provider)()))
    }
}

impl fmt::Debug for Inject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("use_cache", &self.use_cache)
            .finish_non_exhaustive()
    }
}

/// Dependencies registered by name, in registration order.
#[derive(Clone, Default)]
pub struct Dependencies {
    providers: IndexMap<String, Inject>,
}

impl Dependencies {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider, replacing any previous one under `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, inject: Inject) -> Self {
        self.insert(name, inject);
        self
    }

    /// Registers a provider in place.
    pub fn insert(&mut self, name: impl Into<String>, inject: Inject) {
        self.providers.insert(name.into(), inject);
    }

    /// Resolves `name` as a `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, InjectionError> {
        let inject = self
            .providers
            .get(name)
            .ok_or_else(|| InjectionError::NotRegistered {
                name: name.to_string(),
            })?;
        inject
            .provide()
            .downcast::<T>()
            .map_err(|_| InjectionError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Number of registered dependencies.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("names", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_resolve_registered() {
        let deps = Dependencies::new().with("answer", Inject::value(42_u32));
        assert_eq!(*deps.resolve::<u32>("answer").unwrap(), 42);
    }

    #[test]
    fn test_resolve_missing() {
        let deps = Dependencies::new();
        let err = deps.resolve::<u32>("missing").unwrap_err();
        assert_eq!(
            err,
            InjectionError::NotRegistered {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_wrong_type() {
        let deps = Dependencies::new().with("answer", Inject::value(42_u32));
        let err = deps.resolve::<String>("answer").unwrap_err();
        assert!(matches!(err, InjectionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_uncached_provider_runs_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let deps = Dependencies::new().with(
            "counter",
            Inject::new(move || counter.fetch_add(1, Ordering::SeqCst)),
        );

        deps.resolve::<usize>("counter").unwrap();
        deps.resolve::<usize>("counter").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_provider_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let deps = Dependencies::new().with(
            "counter",
            Inject::new(move || counter.fetch_add(1, Ordering::SeqCst)).cached(),
        );

        let first = deps.resolve::<usize>("counter").unwrap();
        let second = deps.resolve::<usize>("counter").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_names_keep_registration_order() {
        let deps = Dependencies::new()
            .with("b", Inject::value(1_u8))
            .with("a", Inject::value(2_u8));
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
