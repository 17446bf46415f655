//! Error types for the tunnel.

use thiserror::Error;

/// Result type alias for tunnel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during tunnel operations.
///
/// Every accepted connection is an independent failure domain: none of these
/// errors propagate beyond the pair of tasks relaying that connection.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Undecodable data on the obfuscated stream
    #[error("codec error: {0}")]
    Codec(String),

    /// Record encryption, authentication, or framing failed.
    ///
    /// The message is for local logs only; the peer observes nothing but the
    /// connection closing, regardless of the cause.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Handshake I/O failure or timestamp outside the accepted window
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Routing decision or target-dial failure
    #[error("routing error: {0}")]
    Routing(String),

    /// Malformed target address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Operation exceeded its deadline
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    /// Create a new crypto error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a new handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create a new routing error
    pub fn routing(msg: impl Into<String>) -> Self {
        Error::Routing(msg.into())
    }

    /// Create a new invalid-address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Error::InvalidAddress(msg.into())
    }

    /// Check if this error should send the connection to fallback
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Error::Handshake(_))
    }
}
