use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use peerhub::config::{Cli, Config};
use peerhub::{audit, lifecycle, listener, Directory};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match Config::from_cli(cli) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    audit::configure(config.audit_sink);

    let tcp_listener = match listener::bind(config.port) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, port = config.port, "failed to bind listening socket");
            return ExitCode::FAILURE;
        }
    };

    let directory = Arc::new(Directory::new());
    lifecycle::install(directory.clone());

    tracing::info!(port = config.port, "peerhubd started");
    listener::serve(tcp_listener, directory);

    ExitCode::SUCCESS
}
