//! Interactive line-echo client.
//!
//! A blocking request/response loop: send one line, wait for its echo,
//! print it, repeat.

use clap::Parser;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "line-echo-client")]
#[command(version = "0.1.0")]
#[command(about = "Interactive client for the line-echo server", long_about = None)]
pub struct ClientArgs {
    /// Server host name or address
    #[arg(default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(default_value_t = 9090)]
    pub port: u16,
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Input was exhausted.
    InputClosed,
    /// Server closed the connection before a full echo arrived.
    ServerClosed,
}

/// Client errors
#[derive(Debug)]
pub enum ClientError {
    Connect { host: String, port: u16 },
    Send(io::Error),
    Receive(io::Error),
    Input(io::Error),
    Output(io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Connect { host, port } => write!(f, "Failed to connect to {host}:{port}"),
            ClientError::Send(e) => write!(f, "send failed: {e}"),
            ClientError::Receive(e) => write!(f, "recv failed: {e}"),
            ClientError::Input(e) => write!(f, "failed to read input: {e}"),
            ClientError::Output(e) => write!(f, "failed to write output: {e}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Connect to the first resolved address that accepts.
pub fn connect(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    let failed = || ClientError::Connect {
        host: host.to_string(),
        port,
    };

    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        debug!(host, port, error = %e, "Address resolution failed");
        failed()
    })?;

    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => debug!(addr = %addr, error = %e, "Connect attempt failed"),
        }
    }

    Err(failed())
}

/// One connection to the server.
pub struct Session<S: Read + Write> {
    server: BufReader<S>,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Self {
            server: BufReader::new(stream),
        }
    }

    /// Send every line of `input` and print each echo to `output` as
    /// `echo: <line>`.
    pub fn run<I: BufRead, O: Write>(
        &mut self,
        mut input: I,
        output: &mut O,
    ) -> Result<SessionEnd, ClientError> {
        let mut line = Vec::new();
        let mut echoed = Vec::new();

        loop {
            line.clear();
            if input.read_until(b'\n', &mut line).map_err(ClientError::Input)? == 0 {
                return Ok(SessionEnd::InputClosed);
            }
            if line.last() != Some(&b'\n') {
                line.push(b'\n');
            }

            self.server
                .get_mut()
                .write_all(&line)
                .map_err(ClientError::Send)?;

            echoed.clear();
            self.server
                .read_until(b'\n', &mut echoed)
                .map_err(ClientError::Receive)?;
            if echoed.last() != Some(&b'\n') {
                return Ok(SessionEnd::ServerClosed);
            }

            print_echo(output, &echoed).map_err(ClientError::Output)?;
        }
    }
}

fn print_echo<O: Write>(output: &mut O, echoed: &[u8]) -> io::Result<()> {
    output.write_all(b"echo: ")?;
    output.write_all(echoed)?;
    output.flush()
}
