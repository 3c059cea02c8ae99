//! Per-pair relay worker.
//!
//! Readiness-based model: mio tells us when either socket of the pair is
//! ready, then we move bytes with non-blocking read/write syscalls. Each
//! direction stages bytes in a bounded `DirectionalBuffer`:
//!
//! ```text
//!   peer A --read--> [A->B buffer] --write--> peer B
//!   peer A <--write-- [B->A buffer] <--read-- peer B
//! ```
//!
//! A peer is read from only while its inbound buffer has room and written to
//! only while the buffer toward it holds data, so a slow reader applies
//! backpressure to its partner instead of growing memory.
//!
//! mio registrations are edge-triggered, so readiness is remembered in
//! per-peer flags. An event sets the flag; a would-block clears it. The worker
//! only blocks in `poll` once no flagged peer has work the buffers allow.

use crate::config::CloseMode;
use crate::error::SessionError;
use crate::runtime::buffer::{DirectionalBuffer, DEFAULT_BUFFER_SIZE};
use crate::runtime::connection::{ConnectionPair, Peer, PeerConn};
use mio::event::Event;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, trace};

const PEER_A: Token = Token(0);
const PEER_B: Token = Token(1);

/// Settings shared by every relay worker.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Capacity of each directional buffer.
    pub buffer_size: usize,
    /// Upper bound on a single readiness wait.
    pub poll_timeout: Duration,
    /// What to do with buffered bytes when a peer closes.
    pub close_mode: CloseMode,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_timeout: Duration::from_secs(10),
            close_mode: CloseMode::Immediate,
        }
    }
}

/// Why a read step stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStop {
    /// No room left in the buffer.
    BufferFull,
    /// Nothing more to read right now.
    WouldBlock,
    /// The peer closed its side in an orderly way.
    Closed,
}

/// Why a write step stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStop {
    /// Everything buffered was written.
    BufferEmpty,
    /// The socket cannot accept more right now.
    WouldBlock,
}

/// Bytes moved by one step and why it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer<S> {
    pub bytes: usize,
    pub stop: S,
}

/// Read everything currently available from `src` into the buffer tail.
///
/// Reads are clamped to the free space. Returns `Err` only for hard errors;
/// an orderly close is reported as `ReadStop::Closed` together with any bytes
/// read before it.
pub fn drain_socket_into_buffer<R: Read>(
    src: &mut R,
    buf: &mut DirectionalBuffer,
) -> io::Result<Transfer<ReadStop>> {
    let mut bytes = 0;

    loop {
        if buf.is_full() {
            return Ok(Transfer {
                bytes,
                stop: ReadStop::BufferFull,
            });
        }

        match src.read(buf.spare_mut()) {
            Ok(0) => {
                return Ok(Transfer {
                    bytes,
                    stop: ReadStop::Closed,
                })
            }
            Ok(n) => {
                buf.commit(n);
                bytes += n;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Ok(Transfer {
                    bytes,
                    stop: ReadStop::WouldBlock,
                })
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Write as much of the buffer as `dst` accepts without blocking.
///
/// Sent bytes are removed from the head and the unsent remainder is shifted
/// to offset zero. Would-block is not an error: the remainder stays buffered
/// for a later attempt.
pub fn flush_buffer_to_socket<W: Write>(
    dst: &mut W,
    buf: &mut DirectionalBuffer,
) -> io::Result<Transfer<WriteStop>> {
    let mut sent = 0;

    let result = loop {
        if sent == buf.len() {
            break Ok(WriteStop::BufferEmpty);
        }

        match dst.write(&buf.filled()[sent..]) {
            Ok(0) => {
                break Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned 0",
                ))
            }
            Ok(n) => sent += n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                break Ok(WriteStop::WouldBlock)
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };

    buf.consume(sent);
    result.map(|stop| Transfer { bytes: sent, stop })
}

/// How a relay session ended.
#[derive(Debug)]
pub enum Termination {
    /// A peer closed its connection.
    Closed(Peer),
    /// A hard I/O error on either socket or the readiness wait.
    Failed(SessionError),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Closed(peer) => write!(f, "peer {peer} closed the connection"),
            Termination::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// One registered socket plus its remembered readiness.
struct Endpoint {
    stream: TcpStream,
    addr: SocketAddr,
    readable: bool,
    writable: bool,
}

impl Endpoint {
    fn register(conn: PeerConn, poll: &Poll, token: Token) -> io::Result<Self> {
        conn.stream.set_nonblocking(true)?;
        let mut stream = TcpStream::from_std(conn.stream);
        poll.registry()
            .register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;

        Ok(Self {
            stream,
            addr: conn.addr,
            readable: false,
            writable: false,
        })
    }

    fn observe(&mut self, event: &Event) {
        // Errors and hangups surface through the next read or write
        if event.is_readable() || event.is_read_closed() || event.is_error() {
            self.readable = true;
        }
        if event.is_writable() || event.is_write_closed() || event.is_error() {
            self.writable = true;
        }
    }
}

/// Relays bytes between the two sockets of one pair until the pair ends.
pub struct RelayWorker {
    id: u64,
    poll: Poll,
    events: Events,
    a: Endpoint,
    b: Endpoint,
    a_to_b: DirectionalBuffer,
    b_to_a: DirectionalBuffer,
    options: RelayOptions,
}

impl RelayWorker {
    /// Take ownership of a pair and register both sockets for readiness.
    pub fn new(pair: ConnectionPair, options: RelayOptions) -> io::Result<Self> {
        let poll = Poll::new()?;
        let a = Endpoint::register(pair.a, &poll, PEER_A)?;
        let b = Endpoint::register(pair.b, &poll, PEER_B)?;

        Ok(Self {
            id: pair.id,
            poll,
            events: Events::with_capacity(4),
            a,
            b,
            a_to_b: DirectionalBuffer::new(options.buffer_size),
            b_to_a: DirectionalBuffer::new(options.buffer_size),
            options,
        })
    }

    /// Relay until either side closes or fails, then close both sockets.
    pub fn run(mut self) -> Termination {
        debug!(
            pair = self.id,
            peer_a = %self.a.addr,
            peer_b = %self.b.addr,
            buffer_size = self.a_to_b.capacity(),
            "Relay started"
        );

        let termination = self.relay();

        if let Termination::Closed(peer) = termination {
            if self.options.close_mode == CloseMode::Flush {
                self.flush_on_close(peer.other());
            }
        }

        let discarded = self.a_to_b.len() + self.b_to_a.len();
        debug!(
            pair = self.id,
            discarded,
            reason = %termination,
            "Relay finished"
        );

        // Dropping self closes both sockets
        termination
    }

    fn relay(&mut self) -> Termination {
        loop {
            if !self.has_ready_work() {
                match self.wait() {
                    Ok(true) => {}
                    Ok(false) => {
                        trace!(pair = self.id, "Readiness wait timed out");
                        continue;
                    }
                    Err(e) => return Termination::Failed(e),
                }
            }

            for peer in [Peer::A, Peer::B] {
                if let Some(termination) = self.read_step(peer) {
                    return termination;
                }
            }

            for peer in [Peer::A, Peer::B] {
                if let Some(termination) = self.write_step(peer) {
                    return termination;
                }
            }
        }
    }

    /// Whether some known-ready socket has work the buffers allow.
    fn has_ready_work(&self) -> bool {
        (self.a.readable && !self.a_to_b.is_full())
            || (self.b.readable && !self.b_to_a.is_full())
            || (self.a.writable && !self.b_to_a.is_empty())
            || (self.b.writable && !self.a_to_b.is_empty())
    }

    /// Block on readiness for at most `poll_timeout`.
    ///
    /// Returns `Ok(false)` when the wait timed out with nothing ready.
    fn wait(&mut self) -> Result<bool, SessionError> {
        loop {
            match self
                .poll
                .poll(&mut self.events, Some(self.options.poll_timeout))
            {
                Ok(()) => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SessionError::Poll(e)),
            }
        }

        if self.events.is_empty() {
            return Ok(false);
        }

        for event in self.events.iter() {
            let endpoint = match event.token() {
                PEER_A => &mut self.a,
                PEER_B => &mut self.b,
                _ => continue,
            };
            endpoint.observe(event);
        }

        Ok(true)
    }

    /// Socket of `peer` and the buffer it fills.
    fn inbound(&mut self, peer: Peer) -> (&mut Endpoint, &mut DirectionalBuffer) {
        match peer {
            Peer::A => (&mut self.a, &mut self.a_to_b),
            Peer::B => (&mut self.b, &mut self.b_to_a),
        }
    }

    /// Socket of `peer` and the buffer destined for it.
    fn outbound(&mut self, peer: Peer) -> (&mut Endpoint, &mut DirectionalBuffer) {
        match peer {
            Peer::A => (&mut self.a, &mut self.b_to_a),
            Peer::B => (&mut self.b, &mut self.a_to_b),
        }
    }

    fn read_step(&mut self, peer: Peer) -> Option<Termination> {
        let id = self.id;
        let (endpoint, buf) = self.inbound(peer);
        if !endpoint.readable || buf.is_full() {
            return None;
        }

        match drain_socket_into_buffer(&mut endpoint.stream, buf) {
            Ok(transfer) => {
                trace!(pair = id, %peer, bytes = transfer.bytes, stop = ?transfer.stop, "Read");
                match transfer.stop {
                    ReadStop::Closed => Some(Termination::Closed(peer)),
                    ReadStop::WouldBlock => {
                        endpoint.readable = false;
                        None
                    }
                    ReadStop::BufferFull => None,
                }
            }
            Err(source) => Some(Termination::Failed(SessionError::Read { peer, source })),
        }
    }

    fn write_step(&mut self, peer: Peer) -> Option<Termination> {
        let id = self.id;
        let (endpoint, buf) = self.outbound(peer);
        if !endpoint.writable || buf.is_empty() {
            return None;
        }

        match flush_buffer_to_socket(&mut endpoint.stream, buf) {
            Ok(transfer) => {
                trace!(pair = id, %peer, bytes = transfer.bytes, stop = ?transfer.stop, "Write");
                if transfer.stop == WriteStop::WouldBlock {
                    endpoint.writable = false;
                }
                None
            }
            Err(source) => Some(Termination::Failed(SessionError::Write { peer, source })),
        }
    }

    /// Deliver bytes still buffered toward `target` after its partner closed.
    ///
    /// Gives up on a write error or when a whole readiness wait passes
    /// without `target` becoming writable.
    fn flush_on_close(&mut self, target: Peer) {
        let id = self.id;
        let mut delivered = 0;

        loop {
            let (endpoint, buf) = self.outbound(target);
            if buf.is_empty() {
                break;
            }

            if endpoint.writable {
                match flush_buffer_to_socket(&mut endpoint.stream, buf) {
                    Ok(transfer) => {
                        delivered += transfer.bytes;
                        if transfer.stop == WriteStop::WouldBlock {
                            endpoint.writable = false;
                        }
                    }
                    Err(e) => {
                        debug!(pair = id, peer = %target, error = %e, "Flush on close failed");
                        return;
                    }
                }
                continue;
            }

            match self.wait() {
                Ok(true) => {}
                Ok(false) => {
                    debug!(pair = id, peer = %target, delivered, "Flush on close timed out");
                    return;
                }
                Err(e) => {
                    debug!(pair = id, peer = %target, error = %e, "Flush on close failed");
                    return;
                }
            }
        }

        if delivered > 0 {
            debug!(pair = id, peer = %target, bytes = delivered, "Flushed pending bytes before close");
        }
    }
}
