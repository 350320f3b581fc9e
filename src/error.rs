//! Error types for the load harness.
//!
//! Every error here is local to a single client slot; none of them stops the
//! process.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::UpgradeRejection;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or driving a client connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Target address or endpoint could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Connect or handshake did not finish in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Server answered 101 but the response is not a valid upgrade.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Response head exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Server refused the upgrade with a non-101 status.
    #[error("Upgrade rejected: {0}")]
    UpgradeRejected(Box<UpgradeRejection>),

    /// Payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<UpgradeRejection> for Error {
    fn from(rejection: UpgradeRejection) -> Self {
        Error::UpgradeRejected(Box::new(rejection))
    }
}
