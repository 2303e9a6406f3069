//! Stream collector - Unix socket byte-stream ingestion and record decoding.
//!
//! A [`CollectorServer`] accepts one connection at a time on a Unix domain
//! socket, reads until the peer closes, then decodes the bytes into 32-byte
//! little-endian unsigned integers ([`Record`]) for a [`RecordSink`].
//!
//! # Modules
//!
//! - [`socket`] - Listener/accept loop and the sending client
//! - [`record`] - Fixed-width record codec
//! - [`sink`] - Record output (stdout lines, channels)
//! - [`config`] - Configuration loading

pub mod config;
pub mod constants;
pub mod error;
pub mod record;
pub mod sink;
pub mod socket;

// Re-export commonly used types
pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use record::Record;
pub use sink::{LinePrinter, RecordSink};
pub use socket::server::{CollectorServer, ConnectionEnd, ConnectionSummary};
