//! The `runserver` directive.
//!
//! Starts the development server for a registered application. With
//! reload enabled the settings file is watched and the application is
//! rebuilt and restarted whenever it changes.

use std::future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use peridot_config::{discover, settings_path_from_env, FileWatcher, Settings};
use peridot_server::{Application, Server, ServerConfig, ServerError, ShutdownSignal};
use peridot_telemetry::{init_logging, LogConfig};
use tokio::task::JoinHandle;

use crate::{AppRegistry, DirectiveError};

/// Whether lifespan events run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LifespanMode {
    /// Run startup and shutdown hooks.
    #[default]
    On,
    /// Skip them.
    Off,
}

/// Options of `runserver`.
#[derive(Args, Debug, Clone)]
pub struct RunserverArgs {
    /// Port to run the development server
    #[arg(short = 'p', long, default_value_t = 8000)]
    pub port: u16,

    /// Server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Reload when the settings file changes (default: on in development and testing)
    #[arg(short = 'r', long, overrides_with = "no_reload")]
    pub reload: bool,

    /// Never reload
    #[arg(long = "no-reload", overrides_with = "reload")]
    pub no_reload: bool,

    /// Start the application in debug mode (the default)
    #[arg(long, overrides_with = "no_debug")]
    pub debug: bool,

    /// Leave the debug flag as the settings define it
    #[arg(long = "no-debug", overrides_with = "debug")]
    pub no_debug: bool,

    /// Log filter, e.g. `debug` or `peridot_server=trace,info`
    #[arg(long, default_value = "debug")]
    pub log_level: String,

    /// Enable lifespan events
    #[arg(long, value_enum, default_value_t = LifespanMode::On)]
    pub lifespan: LifespanMode,

    /// Start the server with a specific settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl RunserverArgs {
    /// Whether to watch the settings file and restart on change.
    ///
    /// `--reload` and `--no-reload` decide when given. Without either,
    /// reload is not simply on: it follows [`Settings::reload`], which is
    /// true only for the development and testing environments.
    pub fn reload_enabled(&self, settings: &Settings) -> bool {
        if self.reload {
            true
        } else if self.no_reload {
            false
        } else {
            settings.reload()
        }
    }

    /// Whether the application's debug flag is switched on.
    pub fn debug_enabled(&self) -> bool {
        !self.no_debug
    }

    /// The server configuration for these options.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            lifespan: self.lifespan == LifespanMode::On,
            ..ServerConfig::default()
        }
    }

    /// Development logging at the requested level.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::development().level(self.log_level.clone())
    }

    /// The settings file, from `--settings` or the environment.
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.settings.clone().or_else(settings_path_from_env)
    }

    /// Runs the directive against the application named `app`.
    pub async fn execute(
        &self,
        app: Option<&str>,
        registry: &AppRegistry,
    ) -> Result<(), DirectiveError> {
        let name = app
            .filter(|name| !name.is_empty())
            .ok_or(DirectiveError::MissingApp)?;
        registry.get(name)?;

        init_logging(&self.log_config())?;

        let path = self.settings_path();
        let settings = discover(path.as_deref())?;
        let reload = self.reload_enabled(&settings);
        tracing::info!("Starting {} server @ {}", settings.environment, self.host);

        let stop = ShutdownSignal::with_os_signals();
        let app = self.prepare(registry, name, settings)?;

        match path {
            Some(path) if reload => self.serve_with_reload(registry, name, &path, app, stop).await,
            _ => {
                if reload {
                    tracing::warn!("no settings file to watch, reload disabled");
                }
                Server::new(Arc::new(app), self.server_config())
                    .run_with_shutdown(stop)
                    .await?;
                Ok(())
            }
        }
    }

    fn prepare(
        &self,
        registry: &AppRegistry,
        name: &str,
        settings: Settings,
    ) -> Result<Application, DirectiveError> {
        let app = registry.build(name, settings)?;
        if self.debug_enabled() {
            app.set_debug(true);
        }
        Ok(app)
    }

    fn spawn(&self, app: Application) -> Running {
        let shutdown = ShutdownSignal::new();
        let server = Server::new(Arc::new(app), self.server_config());
        Running {
            task: tokio::spawn(server.run_with_shutdown(shutdown.clone())),
            shutdown,
        }
    }

    async fn serve_with_reload(
        &self,
        registry: &AppRegistry,
        name: &str,
        path: &Path,
        app: Application,
        stop: ShutdownSignal,
    ) -> Result<(), DirectiveError> {
        let mut watcher = FileWatcher::builder().watch_path(path)?.build()?;
        tracing::info!(path = %path.display(), "watching settings for changes");

        let mut current = Some(self.spawn(app));
        loop {
            let event = tokio::select! {
                () = stop.wait() => Event::Stop,
                change = watcher.next() => match change {
                    Some(change) => Event::Changed(change.path),
                    None => Event::Stop,
                },
                result = finished(&mut current) => Event::Exited(result),
            };

            match event {
                Event::Stop => break,
                Event::Exited(result) => return result.map_err(DirectiveError::from),
                Event::Changed(changed) => {
                    tracing::info!(path = %changed.display(), "settings changed, reloading");
                    if let Some(running) = current.take() {
                        running.stop().await?;
                    }
                    match discover(Some(path)).map_err(DirectiveError::from).and_then(|settings| {
                        self.prepare(registry, name, settings)
                    }) {
                        Ok(app) => current = Some(self.spawn(app)),
                        Err(e) => {
                            tracing::error!(error = %e, "reload failed, waiting for the next change");
                        }
                    }
                }
            }
        }

        if let Some(running) = current {
            running.stop().await?;
        }
        Ok(())
    }
}

enum Event {
    Stop,
    Changed(PathBuf),
    Exited(Result<(), ServerError>),
}

struct Running {
    shutdown: ShutdownSignal,
    task: JoinHandle<Result<(), ServerError>>,
}

impl Running {
    async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "server task failed");
                Ok(())
            }
        }
    }
}

/// Resolves when the running server exits on its own.
async fn finished(current: &mut Option<Running>) -> Result<(), ServerError> {
    let Some(running) = current.as_mut() else {
        return future::pending().await;
    };
    let result = match (&mut running.task).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "server task failed");
            Ok(())
        }
    };
    *current = None;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use peridot_config::Environment;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunserverArgs,
    }

    fn parse(args: &[&str]) -> RunserverArgs {
        let argv = std::iter::once("runserver").chain(args.iter().copied());
        Harness::try_parse_from(argv).unwrap().args
    }

    fn settings(environment: Environment) -> Settings {
        Settings {
            environment,
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.port, 8000);
        assert_eq!(args.host, "localhost");
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.lifespan, LifespanMode::On);
        assert!(args.debug_enabled());
        assert!(args.settings.is_none());
    }

    #[test]
    fn test_options() {
        let args = parse(&[
            "-p",
            "9000",
            "--host",
            "0.0.0.0",
            "--lifespan",
            "off",
            "--log-level",
            "info",
            "--no-debug",
            "--settings",
            "conf/dev.toml",
        ]);
        let config = args.server_config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert!(!config.lifespan);
        assert!(!args.debug_enabled());
        assert_eq!(args.log_config().filter, "info");
        assert_eq!(args.settings_path(), Some(PathBuf::from("conf/dev.toml")));
    }

    #[test]
    fn test_reload_follows_settings_by_default() {
        let args = parse(&[]);
        assert!(args.reload_enabled(&settings(Environment::Development)));
        assert!(args.reload_enabled(&settings(Environment::Testing)));
        assert!(!args.reload_enabled(&settings(Environment::Production)));
    }

    #[test]
    fn test_reload_flags_win() {
        let on = parse(&["--reload"]);
        assert!(on.reload_enabled(&settings(Environment::Production)));

        let off = parse(&["--no-reload"]);
        assert!(!off.reload_enabled(&settings(Environment::Development)));

        let last = parse(&["--reload", "--no-reload"]);
        assert!(!last.reload_enabled(&settings(Environment::Development)));
    }

    #[test]
    fn test_debug_flags() {
        assert!(parse(&["--debug"]).debug_enabled());
        assert!(!parse(&["--debug", "--no-debug"]).debug_enabled());
        assert!(parse(&["--no-debug", "--debug"]).debug_enabled());
    }

    #[test]
    fn test_invalid_lifespan_rejected() {
        let argv = ["runserver", "--lifespan", "maybe"];
        assert!(Harness::try_parse_from(argv).is_err());
    }

    #[tokio::test]
    async fn test_missing_app() {
        let args = parse(&[]);
        let err = args.execute(None, &AppRegistry::new()).await.unwrap_err();
        assert!(matches!(err, DirectiveError::MissingApp));

        let err = args.execute(Some(""), &AppRegistry::new()).await.unwrap_err();
        assert!(matches!(err, DirectiveError::MissingApp));
    }

    #[tokio::test]
    async fn test_unknown_app() {
        let registry = AppRegistry::new().register("blog", Application::builder);
        let err = parse(&[]).execute(Some("shop"), &registry).await.unwrap_err();
        assert!(matches!(err, DirectiveError::UnknownApp { .. }));
    }
}
