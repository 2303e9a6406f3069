//! Collector-wide constants.
//!
//! Groups the framing width, read sizing and socket limits in one place so
//! the server, the sender and the config defaults agree on them.

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Width of one record in bytes (a 256-bit little-endian unsigned integer).
pub const RECORD_WIDTH: usize = 32;

/// Label printed in front of every decoded record.
pub const RECORD_LABEL: &str = "Number";

// ============================================================================
// Socket
// ============================================================================

/// Socket path used when nothing else is configured.
pub const DEFAULT_SOCKET_PATH: &str = "ipc.sock";

/// Maximum bytes requested per read from a connection.
pub const READ_CHUNK_SIZE: usize = 8192;

/// Upper bound on socket path length.
///
/// `sun_path` is 104 bytes on macOS and 108 on Linux; the smaller one wins.
pub const MAX_SOCKET_PATH: usize = 104;

/// Pause after a failed `accept()` before trying again.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// Environment
// ============================================================================

/// Env var naming a JSON config file.
pub const ENV_CONFIG_FILE: &str = "COLLECTOR_CONFIG";

/// Env var overriding the socket path.
pub const ENV_SOCKET_PATH: &str = "COLLECTOR_SOCKET";

/// Env var overriding the read chunk size.
pub const ENV_CHUNK_SIZE: &str = "COLLECTOR_CHUNK_SIZE";
