//! Error types for the collector library.
//!
//! The binary wraps these in `anyhow` with call-site context; the library
//! keeps them typed so callers (and tests) can match on the failure kind.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the collector, the sender and config loading.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The listening socket could not be prepared or bound.
    #[error("Failed to bind socket {}: {source}", .path.display())]
    Bind {
        /// Socket path that was being bound.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// Writing a decoded record to the output sink failed.
    #[error("Failed to write record: {0}")]
    Output(#[source] io::Error),

    /// The sender could not reach the collector socket.
    #[error("Failed to connect to {}: {source}", .path.display())]
    Connect {
        /// Socket path that was being connected to.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// Writing to the collector socket failed after connecting.
    #[error("Failed to send to collector: {0}")]
    Send(#[source] io::Error),

    /// Input text was not an unsigned decimal integer.
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    /// Value does not fit in a single record.
    #[error("Value needs {bits} bits, a record holds at most 256")]
    RecordTooWide {
        /// Significant bits in the rejected value.
        bits: u64,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, CollectorError>;
