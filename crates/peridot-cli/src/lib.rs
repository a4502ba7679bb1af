//! # Peridot CLI
//!
//! Directives run against a registered application. The application is
//! chosen with `--app <name>` or the `PERIDOT_DEFAULT_APP` environment
//! variable.
//!
//! ```text
//! peridot --app blog runserver -p 8080 --reload
//! ```
//!
//! A project binary registers its applications and hands the parsed
//! command line to [`run`]:
//!
//! ```rust,no_run
//! use clap::Parser;
//! use peridot_cli::{AppRegistry, Cli};
//! use peridot_server::Application;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = AppRegistry::new().register("blog", Application::builder);
//!     if let Err(e) = peridot_cli::run(Cli::parse(), &registry).await {
//!         eprintln!("{e}");
//!         std::process::exit(i32::from(e.exit_code()));
//!     }
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/peridot-cli/0.1.0")]

mod error;
mod registry;
pub mod runserver;

use clap::{Parser, Subcommand};

pub use error::DirectiveError;
pub use registry::{AppFactory, AppRegistry};
pub use runserver::{LifespanMode, RunserverArgs};

/// Command line of the `peridot` binary.
#[derive(Parser, Debug)]
#[command(name = "peridot", version, about = "Peridot directives")]
pub struct Cli {
    /// Application to run the directive against
    #[arg(long, global = true, env = "PERIDOT_DEFAULT_APP")]
    pub app: Option<String>,

    /// Directive to run
    #[command(subcommand)]
    pub directive: Directive,
}

/// Available directives.
#[derive(Subcommand, Debug)]
pub enum Directive {
    /// Starts the development server
    Runserver(RunserverArgs),
}

/// Runs the parsed directive.
pub async fn run(cli: Cli, registry: &AppRegistry) -> Result<(), DirectiveError> {
    match &cli.directive {
        Directive::Runserver(args) => args.execute(cli.app.as_deref(), registry).await,
    }
}
