//! Error types for setup and relay sessions.

use crate::runtime::Peer;
use std::io;
use std::net::AddrParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fatal setup errors. Any of these terminates the process.
#[derive(Debug, Error)]
pub enum BouncerError {
    #[error("Invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("Failed to create listening socket: {0}")]
    Socket(#[source] io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Hard I/O failures that end a relay session.
///
/// Would-block never shows up here; it is a normal outcome of a step.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("read from peer {peer} failed: {source}")]
    Read {
        peer: Peer,
        #[source]
        source: io::Error,
    },

    #[error("write to peer {peer} failed: {source}")]
    Write {
        peer: Peer,
        #[source]
        source: io::Error,
    },

    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::Write {
            peer: Peer::B,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"),
        };
        assert_eq!(err.to_string(), "write to peer B failed: broken pipe");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            field: "buffer_size",
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for buffer_size: must be greater than zero"
        );
    }
}
