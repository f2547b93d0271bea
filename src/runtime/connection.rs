//! Connection state machine for echo connections.
//!
//! Each connection owns its socket and two byte buffers: `inbound` holds
//! bytes received but not yet resolved into complete lines, `outbound` holds
//! echoed bytes not yet accepted by the socket. The driver advances both
//! from a single readiness report, and the registry keeps connections and
//! their poll registrations in step.

use crate::protocols::echo::frame_lines;
use bytes::{Buf, BytesMut};
use mio::event::Event;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use slab::Slab;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, trace};

/// Readiness reported by the multiplexer for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// Both directions closed.
    pub hung_up: bool,
    pub error: bool,
}

impl Readiness {
    #[cfg(test)]
    pub const READABLE: Readiness = Readiness {
        readable: true,
        writable: false,
        hung_up: false,
        error: false,
    };

    #[cfg(test)]
    pub const WRITABLE: Readiness = Readiness {
        readable: false,
        writable: true,
        hung_up: false,
        error: false,
    };

    #[cfg(test)]
    pub const READ_WRITE: Readiness = Readiness {
        readable: true,
        writable: true,
        hung_up: false,
        error: false,
    };

    /// Translate a mio event.
    ///
    /// A half-closed peer (read side only) is reported as readable: data
    /// still queued ahead of the FIN is read and framed first, and the
    /// zero-byte read that follows closes the connection.
    pub fn from_event(event: &Event) -> Self {
        Self {
            readable: event.is_readable() || event.is_read_closed(),
            writable: event.is_writable(),
            hung_up: event.is_read_closed() && event.is_write_closed(),
            error: event.is_error(),
        }
    }
}

/// Per-connection buffering limits.
#[derive(Debug, Clone, Copy)]
pub struct BufferLimits {
    /// Upper bound on a single read.
    pub read_chunk_size: usize,
    /// Cap on either buffer; 0 disables it.
    pub max_buffer_bytes: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            max_buffer_bytes: 0,
        }
    }
}

/// Why a connection is being closed.
#[derive(Debug)]
pub enum CloseReason {
    /// Peer closed its side in order (read returned 0).
    PeerClosed,
    /// Multiplexer reported a hang-up.
    HangUp,
    /// Multiplexer reported a socket error.
    SocketError,
    ReadFailed(io::Error),
    WriteFailed(io::Error),
    /// Re-registering with the poll failed.
    RegisterFailed(io::Error),
    /// A buffer grew past `max_buffer_bytes`.
    BufferLimit { pending: usize },
}

impl CloseReason {
    /// Whether the close is a failure worth logging as an error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CloseReason::SocketError
                | CloseReason::ReadFailed(_)
                | CloseReason::WriteFailed(_)
                | CloseReason::RegisterFailed(_)
        )
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::HangUp => write!(f, "hang-up"),
            CloseReason::SocketError => write!(f, "socket error"),
            CloseReason::ReadFailed(e) => write!(f, "read failed: {e}"),
            CloseReason::WriteFailed(e) => write!(f, "write failed: {e}"),
            CloseReason::RegisterFailed(e) => write!(f, "re-register failed: {e}"),
            CloseReason::BufferLimit { pending } => {
                write!(f, "buffer limit exceeded ({pending} bytes pending)")
            }
        }
    }
}

/// Result of driving a connection through one readiness report.
#[derive(Debug)]
pub enum Outcome {
    /// Connection stays registered.
    Open,
    /// Connection must be removed.
    Close(CloseReason),
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    /// Bytes received but not yet framed into complete lines.
    inbound: BytesMut,
    /// Bytes queued for the peer.
    outbound: BytesMut,
}

impl<S> Connection<S> {
    /// Create a connection with empty buffers.
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    #[cfg(test)]
    pub fn inbound(&self) -> &[u8] {
        &self.inbound
    }

    #[cfg(test)]
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Interest derived from buffer state: always readable, writable only
    /// while output is pending.
    pub fn interest(&self) -> Interest {
        if self.outbound.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Advance the connection for one readiness report.
    ///
    /// Order is fixed: hang-up/error check, then at most one read, then at
    /// most one write.
    pub fn drive(&mut self, readiness: Readiness, limits: &BufferLimits) -> Outcome {
        if readiness.hung_up {
            return Outcome::Close(CloseReason::HangUp);
        }
        if readiness.error {
            return Outcome::Close(CloseReason::SocketError);
        }

        if readiness.readable {
            if let Err(reason) = self.read_once(limits.read_chunk_size) {
                return Outcome::Close(reason);
            }
        }

        if readiness.writable && !self.outbound.is_empty() {
            if let Err(reason) = self.write_once() {
                return Outcome::Close(reason);
            }
        }

        if limits.max_buffer_bytes > 0 {
            let pending = self.inbound.len().max(self.outbound.len());
            if pending > limits.max_buffer_bytes {
                return Outcome::Close(CloseReason::BufferLimit { pending });
            }
        }

        Outcome::Open
    }

    fn read_once(&mut self, chunk_size: usize) -> Result<(), CloseReason> {
        let filled = self.inbound.len();
        self.inbound.resize(filled + chunk_size, 0);

        let result = self.stream.read(&mut self.inbound[filled..]);
        let n = match result {
            Ok(n) => n,
            Err(e) => {
                self.inbound.truncate(filled);
                return match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(()),
                    _ => Err(CloseReason::ReadFailed(e)),
                };
            }
        };
        self.inbound.truncate(filled + n);

        if n == 0 {
            if !self.inbound.is_empty() {
                trace!(peer = %self.peer, discarded = self.inbound.len(), "Dropping partial line");
            }
            return Err(CloseReason::PeerClosed);
        }

        let lines = frame_lines(&mut self.inbound, &mut self.outbound, filled);
        debug!(peer = %self.peer, bytes = n, lines, "Read");
        Ok(())
    }

    fn write_once(&mut self) -> Result<(), CloseReason> {
        match self.stream.write(&self.outbound) {
            Ok(0) => Err(CloseReason::WriteFailed(io::Error::new(
                io::ErrorKind::WriteZero,
                "write returned 0",
            ))),
            Ok(n) => {
                self.outbound.advance(n);
                debug!(peer = %self.peer, bytes = n, remaining = self.outbound.len(), "Wrote");
                Ok(())
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(CloseReason::WriteFailed(e)),
        }
    }
}

/// Registry of live connections, keyed by poll token.
///
/// Every entry is registered with the poll for exactly as long as it is in
/// the slab: `insert` registers before the entry becomes visible and
/// `remove` deregisters as it takes the entry out.
pub struct ConnectionRegistry {
    connections: Slab<Connection<TcpStream>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Slab::new(),
        }
    }

    /// Register `stream` with the poll and store it.
    ///
    /// On error nothing is stored and the stream is closed.
    pub fn insert(
        &mut self,
        registry: &Registry,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> io::Result<usize> {
        let entry = self.connections.vacant_entry();
        let conn_id = entry.key();

        let mut conn = Connection::new(stream, peer);
        let interest = conn.interest();
        registry.register(&mut conn.stream, Token(conn_id), interest)?;
        entry.insert(conn);

        Ok(conn_id)
    }

    /// Deregister and take out a connection. Dropping the returned value
    /// closes the socket.
    pub fn remove(&mut self, registry: &Registry, conn_id: usize) -> Option<Connection<TcpStream>> {
        let mut conn = self.connections.try_remove(conn_id)?;
        deregister(registry, conn_id, &mut conn);
        Some(conn)
    }

    /// Re-register a connection with its current interest, re-arming any
    /// readiness still pending on the socket.
    pub fn rearm(&mut self, registry: &Registry, conn_id: usize) -> io::Result<()> {
        let conn = self
            .connections
            .get_mut(conn_id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;
        let interest = conn.interest();
        registry.reregister(&mut conn.stream, Token(conn_id), interest)
    }

    /// Deregister and close every connection.
    pub fn clear(&mut self, registry: &Registry) {
        for (conn_id, conn) in self.connections.iter_mut() {
            deregister(registry, conn_id, conn);
        }
        self.connections.clear();
    }

    pub fn get_mut(&mut self, conn_id: usize) -> Option<&mut Connection<TcpStream>> {
        self.connections.get_mut(conn_id)
    }

    pub fn contains(&self, conn_id: usize) -> bool {
        self.connections.contains(conn_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn deregister(registry: &Registry, conn_id: usize, conn: &mut Connection<TcpStream>) {
    if let Err(e) = registry.deregister(&mut conn.stream) {
        debug!(conn_id, error = %e, "Deregister failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::{Events, Poll};
    use std::collections::VecDeque;
    use std::thread;
    use std::time::Duration;

    /// In-memory stream with scripted reads and a per-call write limit.
    #[derive(Default)]
    struct MockStream {
        reads: VecDeque<Result<Vec<u8>, io::ErrorKind>>,
        written: Vec<u8>,
        write_limit: Option<usize>,
        write_error: Option<io::ErrorKind>,
        read_calls: usize,
        write_calls: usize,
    }

    impl MockStream {
        fn with_reads(chunks: &[&[u8]]) -> Self {
            Self {
                reads: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
                ..Default::default()
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.read_calls += 1;
            match self.reads.pop_front() {
                None => Err(io::ErrorKind::WouldBlock.into()),
                Some(Err(kind)) => Err(kind.into()),
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.reads.push_front(Ok(data[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_calls += 1;
            if let Some(kind) = self.write_error {
                return Err(kind.into());
            }
            let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn connection(stream: MockStream) -> Connection<MockStream> {
        Connection::new(stream, peer())
    }

    #[test]
    fn test_read_then_write_echoes_line() {
        let mut conn = connection(MockStream::with_reads(&[b"ping\n"]));
        let limits = BufferLimits::default();

        assert!(matches!(conn.drive(Readiness::READABLE, &limits), Outcome::Open));
        assert_eq!(conn.outbound(), b"ping\n");
        assert_eq!(conn.interest(), Interest::READABLE | Interest::WRITABLE);

        assert!(matches!(conn.drive(Readiness::WRITABLE, &limits), Outcome::Open));
        assert_eq!(conn.stream.written, b"ping\n");
        assert!(conn.outbound().is_empty());
        assert_eq!(conn.interest(), Interest::READABLE);
    }

    #[test]
    fn test_read_and_write_in_same_report() {
        let mut conn = connection(MockStream::with_reads(&[b"a\nb\nc\n"]));

        conn.drive(Readiness::READ_WRITE, &BufferLimits::default());

        assert_eq!(conn.stream.written, b"a\nb\nc\n");
        assert!(conn.inbound().is_empty());
        assert!(conn.outbound().is_empty());
    }

    #[test]
    fn test_split_line_waits_for_terminator() {
        let mut conn = connection(MockStream::with_reads(&[b"he", b"llo\n"]));
        let limits = BufferLimits::default();

        conn.drive(Readiness::READ_WRITE, &limits);
        assert!(conn.stream.written.is_empty());
        assert_eq!(conn.inbound(), b"he");

        conn.drive(Readiness::READ_WRITE, &limits);
        assert_eq!(conn.stream.written, b"hello\n");
    }

    #[test]
    fn test_one_bounded_read_per_report() {
        let mut conn = connection(MockStream::with_reads(&[b"abcdefgh\n"]));
        let limits = BufferLimits {
            read_chunk_size: 4,
            max_buffer_bytes: 0,
        };

        conn.drive(Readiness::READABLE, &limits);
        assert_eq!(conn.stream.read_calls, 1);
        assert_eq!(conn.inbound(), b"abcd");

        conn.drive(Readiness::READABLE, &limits);
        conn.drive(Readiness::READABLE, &limits);
        assert_eq!(conn.stream.read_calls, 3);
        assert_eq!(conn.outbound(), b"abcdefgh\n");
    }

    #[test]
    fn test_partial_write_keeps_remainder() {
        let mut stream = MockStream::with_reads(&[b"hello world\n"]);
        stream.write_limit = Some(5);
        let mut conn = connection(stream);
        let limits = BufferLimits::default();

        conn.drive(Readiness::READ_WRITE, &limits);
        assert_eq!(conn.stream.written, b"hello");
        assert_eq!(conn.outbound(), b" world\n");

        conn.drive(Readiness::WRITABLE, &limits);
        conn.drive(Readiness::WRITABLE, &limits);
        assert_eq!(conn.stream.written, b"hello world\n");
        assert!(conn.outbound().is_empty());
        assert_eq!(conn.stream.write_calls, 3);
    }

    #[test]
    fn test_writable_without_output_does_not_write() {
        let mut conn = connection(MockStream::default());
        conn.drive(Readiness::WRITABLE, &BufferLimits::default());
        assert_eq!(conn.stream.write_calls, 0);
    }

    #[test]
    fn test_peer_close_discards_partial_line() {
        let mut conn = connection(MockStream::with_reads(&[b"abc", b""]));
        let limits = BufferLimits::default();

        assert!(matches!(conn.drive(Readiness::READ_WRITE, &limits), Outcome::Open));
        match conn.drive(Readiness::READ_WRITE, &limits) {
            Outcome::Close(CloseReason::PeerClosed) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(conn.stream.written.is_empty());
    }

    #[test]
    fn test_hang_up_skips_io() {
        let mut conn = connection(MockStream::with_reads(&[b"ping\n"]));
        let readiness = Readiness {
            hung_up: true,
            ..Readiness::READ_WRITE
        };

        match conn.drive(readiness, &BufferLimits::default()) {
            Outcome::Close(CloseReason::HangUp) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(conn.stream.read_calls, 0);
    }

    #[test]
    fn test_socket_error_skips_io() {
        let mut conn = connection(MockStream::with_reads(&[b"ping\n"]));
        let readiness = Readiness {
            error: true,
            ..Readiness::READABLE
        };

        let outcome = conn.drive(readiness, &BufferLimits::default());
        assert!(matches!(outcome, Outcome::Close(CloseReason::SocketError)));
        assert_eq!(conn.stream.read_calls, 0);
    }

    #[test]
    fn test_read_error_closes() {
        let mut stream = MockStream::default();
        stream.reads.push_back(Err(io::ErrorKind::ConnectionReset));
        let mut conn = connection(stream);

        match conn.drive(Readiness::READABLE, &BufferLimits::default()) {
            Outcome::Close(reason @ CloseReason::ReadFailed(_)) => assert!(reason.is_error()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_would_block_is_not_an_error() {
        let mut stream = MockStream::default();
        stream.reads.push_back(Err(io::ErrorKind::WouldBlock));
        stream.reads.push_back(Err(io::ErrorKind::Interrupted));
        let mut conn = connection(stream);
        let limits = BufferLimits::default();

        assert!(matches!(conn.drive(Readiness::READABLE, &limits), Outcome::Open));
        assert!(matches!(conn.drive(Readiness::READABLE, &limits), Outcome::Open));
        assert!(conn.inbound().is_empty());
    }

    #[test]
    fn test_write_error_closes() {
        let mut stream = MockStream::with_reads(&[b"ping\n"]);
        stream.write_error = Some(io::ErrorKind::BrokenPipe);
        let mut conn = connection(stream);

        let outcome = conn.drive(Readiness::READ_WRITE, &BufferLimits::default());
        assert!(matches!(
            outcome,
            Outcome::Close(CloseReason::WriteFailed(_))
        ));
    }

    #[test]
    fn test_write_zero_closes() {
        let mut stream = MockStream::with_reads(&[b"ping\n"]);
        stream.write_limit = Some(0);
        let mut conn = connection(stream);

        match conn.drive(Readiness::READ_WRITE, &BufferLimits::default()) {
            Outcome::Close(CloseReason::WriteFailed(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::WriteZero)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_line_hits_buffer_limit() {
        let mut conn = connection(MockStream::with_reads(&[b"0123456789"]));
        let limits = BufferLimits {
            read_chunk_size: 4096,
            max_buffer_bytes: 8,
        };

        match conn.drive(Readiness::READABLE, &limits) {
            Outcome::Close(reason @ CloseReason::BufferLimit { pending: 10 }) => {
                assert!(!reason.is_error())
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_undrained_output_hits_buffer_limit() {
        let mut stream = MockStream::with_reads(&[b"abc\n", b"def\n", b"ghi\n"]);
        stream.write_error = Some(io::ErrorKind::WouldBlock);
        let mut conn = connection(stream);
        let limits = BufferLimits {
            read_chunk_size: 4096,
            max_buffer_bytes: 10,
        };

        assert!(matches!(conn.drive(Readiness::READ_WRITE, &limits), Outcome::Open));
        assert!(matches!(conn.drive(Readiness::READ_WRITE, &limits), Outcome::Open));
        assert!(matches!(
            conn.drive(Readiness::READ_WRITE, &limits),
            Outcome::Close(CloseReason::BufferLimit { pending: 12 })
        ));
    }

    #[test]
    fn test_unlimited_buffers_by_default() {
        let big = vec![b'x'; 64 * 1024];
        let mut conn = connection(MockStream::with_reads(&[&big]));
        let limits = BufferLimits::default();

        for _ in 0..16 {
            assert!(matches!(conn.drive(Readiness::READABLE, &limits), Outcome::Open));
        }
        assert_eq!(conn.inbound().len(), 64 * 1024);
    }

    #[test]
    fn test_registry_tracks_poll_registration() {
        let poll = Poll::new().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut registry = ConnectionRegistry::new();
        let mut ids = Vec::new();
        for _ in 0..2 {
            let client = std::net::TcpStream::connect(addr).unwrap();
            client.set_nonblocking(true).unwrap();
            let stream = TcpStream::from_std(client);
            ids.push(registry.insert(poll.registry(), stream, addr).unwrap());
        }
        assert_eq!(registry.len(), 2);
        assert_ne!(ids[0], ids[1]);

        registry.rearm(poll.registry(), ids[0]).unwrap();

        let removed = registry.remove(poll.registry(), ids[0]).unwrap();
        assert_eq!(removed.peer(), addr);
        assert!(!registry.contains(ids[0]));
        assert!(registry.remove(poll.registry(), ids[0]).is_none());
        assert!(registry.rearm(poll.registry(), ids[0]).is_err());

        registry.clear(poll.registry());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_closes_every_connection() {
        let poll = Poll::new().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut registry = ConnectionRegistry::new();
        let mut peers = Vec::new();
        for _ in 0..3 {
            let client = std::net::TcpStream::connect(addr).unwrap();
            client.set_nonblocking(true).unwrap();
            registry
                .insert(poll.registry(), TcpStream::from_std(client), addr)
                .unwrap();
            peers.push(listener.accept().unwrap().0);
        }

        registry.clear(poll.registry());
        assert!(registry.is_empty());

        for mut peer in peers {
            peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            let mut buf = [0u8; 8];
            assert_eq!(peer.read(&mut buf).unwrap(), 0);
        }
    }

    /// Accepted side as a mio stream, plus the connecting std stream.
    fn loopback_pair() -> (TcpStream, SocketAddr, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let peer = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, addr) = listener.accept().unwrap();
        accepted.set_nonblocking(true).unwrap();
        (TcpStream::from_std(accepted), addr, peer)
    }

    fn poll_readiness(poll: &mut Poll, conn: &mut Connection<TcpStream>) -> Readiness {
        poll.registry()
            .register(&mut conn.stream, Token(0), Interest::READABLE)
            .unwrap();

        let mut events = Events::with_capacity(8);
        poll.poll(&mut events, Some(Duration::from_secs(5))).unwrap();
        let event = events
            .iter()
            .find(|event| event.token() == Token(0))
            .expect("no event for connection");
        Readiness::from_event(event)
    }

    #[test]
    fn test_half_closed_socket_is_readable_then_closes() {
        let mut poll = Poll::new().unwrap();
        let (stream, addr, mut peer) = loopback_pair();
        peer.write_all(b"abc\n").unwrap();
        peer.shutdown(std::net::Shutdown::Write).unwrap();
        thread::sleep(Duration::from_millis(50));

        let mut conn = Connection::new(stream, addr);
        let readiness = poll_readiness(&mut poll, &mut conn);
        assert!(readiness.readable);
        assert!(!readiness.hung_up);
        assert!(!readiness.error);

        let limits = BufferLimits::default();
        assert!(matches!(conn.drive(readiness, &limits), Outcome::Open));
        assert_eq!(conn.outbound(), b"abc\n");
        assert!(matches!(
            conn.drive(readiness, &limits),
            Outcome::Close(CloseReason::PeerClosed)
        ));
    }

    #[test]
    fn test_reset_socket_closes_without_io() {
        let mut poll = Poll::new().unwrap();
        let (stream, addr, peer) = loopback_pair();
        let peer = socket2::Socket::from(peer);
        peer.set_linger(Some(Duration::ZERO)).unwrap();
        drop(peer);
        thread::sleep(Duration::from_millis(50));

        let mut conn = Connection::new(stream, addr);
        let readiness = poll_readiness(&mut poll, &mut conn);
        assert!(readiness.hung_up || readiness.error);

        match conn.drive(readiness, &BufferLimits::default()) {
            Outcome::Close(CloseReason::HangUp | CloseReason::SocketError) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(conn.inbound().is_empty());
    }
}
