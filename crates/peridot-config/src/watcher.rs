//! Settings file watching for reload.
//!
//! [`FileWatcher`] turns `notify` events into debounced
//! [`FileChangeEvent`]s on a tokio channel. The `runserver` directive uses
//! it to rebuild the application when the settings file changes.
//!
//! ```no_run
//! use std::time::Duration;
//! use peridot_config::FileWatcher;
//!
//! # async fn example() -> Result<(), peridot_config::ConfigError> {
//! let mut watcher = FileWatcher::builder()
//!     .debounce(Duration::from_millis(300))
//!     .watch_path("settings.toml")?
//!     .build()?;
//!
//! while let Some(event) = watcher.next().await {
//!     println!("{} changed", event.path.display());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::ConfigError;

/// A debounced change to a watched file.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// Changed path.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileChangeKind,
    /// When the change was observed.
    pub timestamp: Instant,
}

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// File created.
    Created,
    /// File contents or metadata changed.
    Modified,
    /// File removed.
    Deleted,
}

impl FileChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// Builder for [`FileWatcher`].
#[derive(Debug)]
pub struct FileWatcherBuilder {
    paths: Vec<PathBuf>,
    debounce: Duration,
    extensions: HashSet<String>,
}

impl Default for FileWatcherBuilder {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            debounce: Duration::from_millis(500),
            extensions: HashSet::new(),
        }
    }
}

impl FileWatcherBuilder {
    /// Minimum time between two events for the same path.
    #[must_use]
    pub fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Watches an existing file or directory.
    pub fn watch_path<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        self.paths.push(path.to_path_buf());
        Ok(self)
    }

    /// Only reports files with these extensions (without the dot).
    #[must_use]
    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Starts watching.
    pub fn build(self) -> Result<FileWatcher, ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::Watch {
                message: "no paths to watch".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(64);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })
        .map_err(|e| ConfigError::Watch {
            message: format!("failed to create watcher: {e}"),
        })?;

        for path in &self.paths {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| ConfigError::Watch {
                    message: format!("failed to watch {}: {e}", path.display()),
                })?;
        }

        Ok(FileWatcher {
            _watcher: watcher,
            rx,
            debounce: self.debounce,
            extensions: self.extensions,
            last_event: None,
        })
    }
}

/// Watches files and yields debounced change events.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    debounce: Duration,
    extensions: HashSet<String>,
    last_event: Option<(PathBuf, Instant)>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("debounce", &self.debounce)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Starts building a watcher.
    pub fn builder() -> FileWatcherBuilder {
        FileWatcherBuilder::default()
    }

    /// Waits for the next relevant change. `None` once the watcher stops.
    pub async fn next(&mut self) -> Option<FileChangeEvent> {
        while let Some(event) = self.rx.recv().await {
            if let Some(change) = self.process(event) {
                return Some(change);
            }
        }
        None
    }

    fn process(&mut self, event: Event) -> Option<FileChangeEvent> {
        let kind = FileChangeKind::from_event(&event.kind)?;
        let path = event
            .paths
            .into_iter()
            .find(|path| self.matches_extension(path))?;

        let now = Instant::now();
        if let Some((last_path, last_time)) = &self.last_event {
            if *last_path == path && now.duration_since(*last_time) < self.debounce {
                return None;
            }
        }
        self.last_event = Some((path.clone(), now));

        tracing::debug!(path = %path.display(), ?kind, "watched file changed");
        Some(FileChangeEvent {
            path,
            kind,
            timestamp: now,
        })
    }

    fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}
