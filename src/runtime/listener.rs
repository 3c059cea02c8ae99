//! Pairing listener.
//!
//! Accepts clients two at a time from a blocking listening socket and hands
//! each pair to a freshly spawned, detached relay worker thread. Pairing is
//! purely positional: the 1st and 2nd accepted connections form pair 1, the
//! 3rd and 4th pair 2, and so on.

use crate::error::BouncerError;
use crate::runtime::connection::ConnectionPair;
use crate::runtime::relay::{RelayOptions, RelayWorker};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::thread;
use tracing::{debug, error, warn};

/// Listening socket plus the pairing state.
#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    options: RelayOptions,
    /// Pairs formed so far; also the id of the most recent pair.
    pairs: u64,
}

impl Listener {
    /// Bind and listen on `addr` with `SO_REUSEADDR` set.
    pub fn bind(addr: &str, backlog: i32, options: RelayOptions) -> Result<Self, BouncerError> {
        let addr: SocketAddr = addr.parse().map_err(|source| BouncerError::InvalidAddress {
            addr: addr.to_string(),
            source,
        })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(BouncerError::Socket)?;
        socket
            .set_reuse_address(true)
            .map_err(BouncerError::Socket)?;
        socket
            .bind(&addr.into())
            .map_err(|source| BouncerError::Bind { addr, source })?;
        socket
            .listen(backlog)
            .map_err(|source| BouncerError::Listen { addr, source })?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr().map_err(BouncerError::Socket)?;

        Ok(Self {
            listener,
            local_addr,
            options,
            pairs: 0,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until two connections arrive and pair them.
    ///
    /// Both accepts are always attempted. If either fails, the connection
    /// accepted alongside it is closed and the error returned.
    pub fn accept_pair(&mut self) -> io::Result<ConnectionPair> {
        let first = self.listener.accept();
        let second = self.listener.accept();

        match (first, second) {
            (Ok(a), Ok(b)) => {
                self.pairs += 1;
                Ok(ConnectionPair::new(self.pairs, a, b))
            }
            (Ok((_, addr)), Err(e)) | (Err(e), Ok((_, addr))) => {
                debug!(peer = %addr, "Closing connection from incomplete pair");
                Err(e)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// Accept and dispatch pairs forever.
    pub fn run(mut self) {
        loop {
            match self.accept_pair() {
                Ok(pair) => self.dispatch(pair),
                Err(e) => warn!(error = %e, "Accept failed, discarding partial pair"),
            }
        }
    }

    /// Move the pair into its own detached worker thread.
    fn dispatch(&self, pair: ConnectionPair) {
        let id = pair.id;
        let options = self.options;

        debug!(
            pair = id,
            peer_a = %pair.a.addr,
            peer_b = %pair.b.addr,
            "Paired connections"
        );

        let spawned = thread::Builder::new()
            .name(format!("relay-{id}"))
            .spawn(move || match RelayWorker::new(pair, options) {
                Ok(worker) => {
                    worker.run();
                }
                Err(e) => warn!(pair = id, error = %e, "Failed to start relay worker"),
            });

        // The handle is dropped: workers are never joined
        if let Err(e) = spawned {
            error!(pair = id, error = %e, "Failed to spawn relay worker");
        }
    }
}
