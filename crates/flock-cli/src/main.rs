//! CLI entry point.
//!
//! The same binary is both the command-line front end and, when started by a
//! master with `FLOCK_ROLE=worker`, one of its workers.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flock_cli::{Cli, CliConfig, EchoWorker, bootstrap, handlers};
use flock_core::ControlAction;
use flock_runtime::WorkerAgent;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Worker stdout carries the master protocol, so logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Some(agent) = WorkerAgent::from_env() {
        init_tracing(false);
        let code = agent.run(EchoWorker::from_env()).await;
        std::process::exit(code);
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let action = ControlAction::from_arg(cli.action.as_deref());
    let result = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => {
            let ctx = bootstrap(config);
            handlers::dispatch(&ctx, action).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
