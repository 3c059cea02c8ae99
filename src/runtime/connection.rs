//! Connection pairs handed from the listener to relay workers.
//!
//! A pair is two already-connected client sockets. Ownership moves into
//! exactly one worker, and dropping the pair closes both sockets.

use std::fmt;
use std::net::{SocketAddr, TcpStream};

/// One side of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    A,
    B,
}

impl Peer {
    /// The opposite side of the pair.
    pub fn other(self) -> Peer {
        match self {
            Peer::A => Peer::B,
            Peer::B => Peer::A,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::A => f.write_str("A"),
            Peer::B => f.write_str("B"),
        }
    }
}

/// A single accepted client socket and its remote address.
#[derive(Debug)]
pub struct PeerConn {
    pub stream: TcpStream,
    pub addr: SocketAddr,
}

/// Two client connections relayed to each other as one session.
#[derive(Debug)]
pub struct ConnectionPair {
    /// Sequence number assigned by the listener, starting at 1.
    pub id: u64,
    pub a: PeerConn,
    pub b: PeerConn,
}

impl ConnectionPair {
    pub fn new(id: u64, a: (TcpStream, SocketAddr), b: (TcpStream, SocketAddr)) -> Self {
        Self {
            id,
            a: PeerConn {
                stream: a.0,
                addr: a.1,
            },
            b: PeerConn {
                stream: b.0,
                addr: b.1,
            },
        }
    }
}
