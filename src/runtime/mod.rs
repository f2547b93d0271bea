//! Readiness-driven runtime for the echo server.
//!
//! - `listener`: listening socket setup
//! - `connection`: per-connection buffers, the driver and the registry
//! - `event_loop`: the mio poll loop tying them together

pub mod connection;
mod event_loop;
mod listener;

pub use connection::{BufferLimits, CloseReason, Connection, ConnectionRegistry, Outcome, Readiness};
pub use event_loop::{Server, ShutdownHandle};

use crate::config::Config;
use tracing::error;

/// Bind and run the server on the calling thread until it stops.
///
/// Fatal errors are logged here before being returned.
pub fn run(config: &Config) -> std::io::Result<()> {
    let server = Server::bind(config).map_err(|e| {
        error!(host = %config.host, port = config.port, error = %e, "Failed to bind listener");
        e
    })?;
    server.run()
}
