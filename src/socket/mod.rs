//! Unix domain socket transport for record streams.
//!
//! ```text
//! Producer (send)                      Collector (listen)
//! ┌──────────────────┐                ┌──────────────────────┐
//! │ client           │  raw bytes,    │ CollectorServer      │
//! │  UnixStream      │───────────────►│  UnixListener        │
//! │  write + close   │  then EOF      │  one conn at a time  │
//! └──────────────────┘                └──────────┬───────────┘
//!                                                │ buffer → records
//!                                                ▼
//!                                           RecordSink
//! ```
//!
//! # Wire Protocol
//!
//! None beyond concatenation: the peer writes bytes and closes. The
//! collector reads to EOF and decodes the whole buffer as consecutive
//! 32-byte little-endian integers.

pub mod client;
pub mod server;
