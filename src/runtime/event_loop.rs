//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us which sockets are ready, then each
//! ready connection gets one bounded read and one write. Everything runs on
//! the calling thread.
//!
//! mio reports readiness edges, while the echo driver deliberately stops
//! after one read per notification so a busy peer cannot starve the others.
//! To bridge the two, every connection driven in an iteration is
//! re-registered with its freshly derived interest before the next poll.
//! Re-registering re-arms the notification, so input left unread or output
//! left unwritten is reported again.

use crate::config::Config;
use crate::runtime::connection::{BufferLimits, CloseReason, ConnectionRegistry, Outcome, Readiness};
use crate::runtime::listener;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);
const WAKER_TOKEN: Token = Token(usize::MAX - 1);

/// Single-threaded echo server.
///
/// Owns the poll, the listener and every connection. All sockets are closed
/// when `run` returns.
pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: ConnectionRegistry,
    limits: BufferLimits,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
    /// Snapshot of the last poll, so removals cannot disturb iteration.
    ready: Vec<(Token, Readiness)>,
    /// Connections driven since the last poll; re-armed before the next one.
    touched: Vec<usize>,
    listener_needs_rearm: bool,
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to close every connection and return from `run`.
    pub fn shutdown(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake()
    }
}

impl Server {
    /// Bind the listening socket and set up the poll.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let ip: IpAddr = config
            .host
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let addr = SocketAddr::new(ip, config.port);

        let poll = Poll::new()?;
        let mut listener = listener::bind(addr, config.backlog)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        Ok(Self {
            poll,
            events: Events::with_capacity(config.event_capacity),
            listener,
            connections: ConnectionRegistry::new(),
            limits: BufferLimits {
                read_chunk_size: config.read_chunk_size,
                max_buffer_bytes: config.max_buffer_bytes,
            },
            waker,
            shutdown: Arc::new(AtomicBool::new(false)),
            ready: Vec::with_capacity(config.event_capacity),
            touched: Vec::new(),
            listener_needs_rearm: false,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
            requested: Arc::clone(&self.shutdown),
        }
    }

    /// Run until shutdown is requested or the poll fails.
    pub fn run(mut self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "Echo server listening");

        let result = self.event_loop();

        let open = self.connections.len();
        self.connections.clear(self.poll.registry());
        match &result {
            Ok(()) => info!(closed = open, "Server stopped"),
            Err(e) => error!(closed = open, error = %e, "Server stopped on fatal error"),
        }
        result
    }

    fn event_loop(&mut self) -> io::Result<()> {
        while self.turn(None)? {}
        Ok(())
    }

    /// One iteration: re-arm, poll, accept, drive.
    ///
    /// Returns `false` once shutdown has been requested. An interrupted poll
    /// counts as an empty iteration.
    fn turn(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        self.rearm()?;

        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(true);
            }
            return Err(e);
        }

        self.ready.clear();
        self.ready.extend(
            self.events
                .iter()
                .map(|event| (event.token(), Readiness::from_event(event))),
        );

        let mut accept = false;
        for &(token, _) in &self.ready {
            match token {
                LISTENER_TOKEN => accept = true,
                WAKER_TOKEN => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        info!("Shutdown requested");
                        return Ok(false);
                    }
                }
                _ => {}
            }
        }

        if accept {
            self.accept_connections();
        }

        for i in 0..self.ready.len() {
            let (token, readiness) = self.ready[i];
            if token == LISTENER_TOKEN || token == WAKER_TOKEN {
                continue;
            }
            self.drive_connection(token.0, readiness);
        }

        Ok(true)
    }

    /// Re-register everything touched since the last poll.
    fn rearm(&mut self) -> io::Result<()> {
        if self.listener_needs_rearm {
            self.poll
                .registry()
                .reregister(&mut self.listener, LISTENER_TOKEN, Interest::READABLE)?;
            self.listener_needs_rearm = false;
        }

        let touched = std::mem::take(&mut self.touched);
        for &conn_id in &touched {
            if !self.connections.contains(conn_id) {
                continue;
            }
            if let Err(e) = self.connections.rearm(self.poll.registry(), conn_id) {
                self.close_connection(conn_id, CloseReason::RegisterFailed(e));
            }
        }
        self.touched = touched;
        self.touched.clear();

        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    match self.connections.insert(self.poll.registry(), stream, peer) {
                        Ok(conn_id) => info!(conn_id, peer = %peer, "Client connected"),
                        Err(e) => error!(peer = %peer, error = %e, "Failed to register connection"),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Retried once the listener is re-armed.
                    error!(error = %e, "Accept failed");
                    self.listener_needs_rearm = true;
                    break;
                }
            }
        }
    }

    fn drive_connection(&mut self, conn_id: usize, readiness: Readiness) {
        let conn = match self.connections.get_mut(conn_id) {
            Some(conn) => conn,
            None => return,
        };

        match conn.drive(readiness, &self.limits) {
            Outcome::Open => self.touched.push(conn_id),
            Outcome::Close(reason) => self.close_connection(conn_id, reason),
        }
    }

    fn close_connection(&mut self, conn_id: usize, reason: CloseReason) {
        let conn = match self.connections.remove(self.poll.registry(), conn_id) {
            Some(conn) => conn,
            None => return,
        };
        let peer = conn.peer();
        drop(conn);

        if reason.is_error() {
            error!(conn_id, peer = %peer, reason = %reason, "Client disconnected");
        } else if matches!(reason, CloseReason::BufferLimit { .. }) {
            warn!(conn_id, peer = %peer, reason = %reason, "Client disconnected");
        } else {
            info!(conn_id, peer = %peer, reason = %reason, "Client disconnected");
        }
        debug!(open = self.connections.len(), "Connection closed");
    }
}
