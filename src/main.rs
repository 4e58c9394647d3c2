//! `parley` server binary.
//!
//! Parses the command line, binds the listening socket and serves until
//! Ctrl+C. Exits with status 2 on invalid arguments and 1 when the socket
//! cannot be set up.

use std::process::ExitCode;

use parley::{ActionProcessor, ConfigError, Server, config::parse_arguments};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_SETUP_FAILURE: u8 = 1;
const EXIT_INVALID_ARGUMENT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match parse_arguments(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::HelpRequested(text)) => {
            print!("{text}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_INVALID_ARGUMENT);
        }
    };

    if let Some(addr) = config.metrics_addr() {
        install_metrics(addr);
    }

    let server = match Server::new(ActionProcessor).bind(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, port = config.port(), host = %config.host(), "failed to start");
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };
    info!(local_addr = ?server.local_addr(), "server bound");

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) {
    match parley::metrics::install_prometheus(addr) {
        Ok(()) => info!(%addr, "serving metrics"),
        Err(e) => error!(error = %e, %addr, "failed to start metrics exporter"),
    }
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) {
    tracing::warn!(%addr, "metrics support not compiled in; ignoring --metrics-addr");
}
