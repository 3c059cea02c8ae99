//! Loopback socket helpers for tests.

use crate::runtime::connection::ConnectionPair;
use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected loopback socket pair: (client side, accepted side).
pub(crate) fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = connect(listener.local_addr().unwrap());
    let (accepted, _) = listener.accept().unwrap();
    (client, accepted)
}

/// Connect a client with read/write timeouts so a stuck relay fails the test.
pub(crate) fn connect(addr: std::net::SocketAddr) -> TcpStream {
    let client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();
    client.set_write_timeout(Some(CLIENT_TIMEOUT)).unwrap();
    client
}

/// Two clients plus the pair of accepted sockets a worker would receive.
pub(crate) fn relay_pair(id: u64) -> (TcpStream, TcpStream, ConnectionPair) {
    let (client_a, server_a) = connected_pair();
    let (client_b, server_b) = connected_pair();
    let addr_a = client_a.local_addr().unwrap();
    let addr_b = client_b.local_addr().unwrap();
    let pair = ConnectionPair::new(id, (server_a, addr_a), (server_b, addr_b));
    (client_a, client_b, pair)
}

/// Read until the far end closes, treating a reset as a close.
pub(crate) fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return out,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => return out,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => panic!("read failed before close: {e}"),
        }
    }
}
