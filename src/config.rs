//! Collector configuration.
//!
//! Resolution order, last one wins:
//! 1. Built-in defaults (`ipc.sock`, 8192-byte reads)
//! 2. JSON file named by `COLLECTOR_CONFIG`, if set
//! 3. `COLLECTOR_SOCKET` / `COLLECTOR_CHUNK_SIZE` env vars
//! 4. CLI flags (applied by the binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_SOCKET_PATH, ENV_CHUNK_SIZE, ENV_CONFIG_FILE, ENV_SOCKET_PATH, READ_CHUNK_SIZE,
};
use crate::error::{CollectorError, Result};

/// Settings for a [`CollectorServer`](crate::CollectorServer).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Filesystem path of the listening socket.
    pub socket_path: PathBuf,
    /// Maximum bytes requested per read.
    pub read_chunk_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            read_chunk_size: READ_CHUNK_SIZE,
        }
    }
}

impl CollectorConfig {
    /// Default settings listening on `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }

    /// Load from the environment: optional config file, then env overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable variable lookup.
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_FILE) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CollectorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| CollectorError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(socket_path) = lookup(ENV_SOCKET_PATH) {
            self.socket_path = PathBuf::from(socket_path);
        }

        if let Some(chunk_size) = lookup(ENV_CHUNK_SIZE) {
            self.read_chunk_size = chunk_size.trim().parse().map_err(|e| {
                CollectorError::Config(format!("{ENV_CHUNK_SIZE}={chunk_size:?}: {e}"))
            })?;
        }

        Ok(())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(CollectorError::Config(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(CollectorError::Config("socket_path must not be empty".to_string()));
        }
        Ok(())
    }
}
