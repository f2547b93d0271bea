//! line-echo server.
//!
//! Listens on `0.0.0.0:<port>` (default 9090) and echoes back every
//! newline-terminated line it receives.
//!
//! Configuration via CLI arguments or TOML file; see `line-echo --help`.

use line_echo::config::Config;
use line_echo::runtime;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Load configuration; logging is not up yet
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        backlog = config.backlog,
        max_buffer_bytes = config.max_buffer_bytes,
        "Starting line-echo server"
    );

    // The runtime has already logged the failure.
    match runtime::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
