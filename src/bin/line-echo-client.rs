//! Interactive line-echo client.
//!
//! Usage: `line-echo-client [HOST] [PORT]`, defaults `127.0.0.1 9090`.

use clap::Parser;
use line_echo::client::{self, ClientArgs, Session, SessionEnd};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = ClientArgs::parse();

    let stream = match client::connect(&args.host, args.port) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Connected to {}:{}", args.host, args.port);
    println!("Type lines and press Enter. Ctrl-D to quit.");

    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    match Session::new(stream).run(stdin, &mut stdout) {
        Ok(SessionEnd::InputClosed) => {
            println!("\nDisconnected.");
            ExitCode::SUCCESS
        }
        Ok(SessionEnd::ServerClosed) => {
            eprintln!("Server closed connection.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
