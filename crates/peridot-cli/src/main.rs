//! The `peridot` binary.
//!
//! Ships a `welcome` application so `peridot --app welcome runserver`
//! works out of the box. Projects build their own binary on
//! [`peridot_cli::run`] with their applications registered.

use std::process::ExitCode;

use clap::Parser;
use peridot_cli::{AppRegistry, Cli};
use peridot_core::{responses, Handler};
use peridot_router::Gateway;
use peridot_server::Application;

fn registry() -> AppRegistry {
    AppRegistry::new().register("welcome", |settings| {
        let greeting = format!("Welcome to {}", settings.app_name);
        Application::builder(settings).route(
            Gateway::get(
                "/",
                Handler::new(move |_| {
                    let greeting = greeting.clone();
                    async move { responses::text(greeting) }
                }),
            )
            .name("welcome"),
        )
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match peridot_cli::run(cli, &registry()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:#}", anyhow::Error::from(e));
            ExitCode::from(code)
        }
    }
}
