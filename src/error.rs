//! Error types for the relay.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while relaying queries or running listeners.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS message could not be parsed or encoded.
    #[error("DNS error: {0}")]
    Dns(#[from] hickory_proto::ProtoError),

    /// The upstream did not answer within the exchange timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The SOCKS5 proxy refused or failed the tunnel.
    #[error("SOCKS5 error: {0}")]
    Socks(#[from] tokio_socks::Error),

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A message too short or too broken to relay.
    #[error("malformed message: {0}")]
    Malformed(&'static str),

    /// Startup configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream address did not resolve to a usable socket address.
    #[error("cannot resolve upstream {0}")]
    Resolve(String),

    /// The upstream answered with a different message id.
    #[error("response id {got} does not match query id {expected}")]
    IdMismatch { expected: u16, got: u16 },
}
