//! Configuration for kvdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{KvdbError, Result};

/// Default TCP port
pub const DEFAULT_PORT: u16 = 1337;

/// Default WAL file name
pub const DEFAULT_LOG_FILE_PATH: &str = "kvdb_write.log";

/// Main configuration for a kvdb server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Path of the write-ahead log file (created if missing)
    pub log_file_path: PathBuf,

    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Interface to bind
    pub host: String,

    /// TCP port (0 picks an ephemeral port)
    pub port: u16,

    /// Accepted sockets waiting for a worker thread
    pub connection_queue_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// Hand every record to the OS, never fsync
    OsBuffer,

    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
            wal_sync_strategy: WalSyncStrategy::OsBuffer,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            connection_queue_size: 128,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `host:port` string for binding
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.log_file_path.as_os_str().is_empty() {
            return Err(KvdbError::Config("log file path is empty".to_string()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(KvdbError::Config(
                "EveryNEntries sync strategy needs a count above zero".to_string(),
            ));
        }
        if self.connection_queue_size == 0 {
            return Err(KvdbError::Config(
                "connection queue size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the WAL file path
    pub fn log_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file_path = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the interface to bind
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the TCP port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the capacity of the accepted-connection queue
    pub fn connection_queue_size(mut self, size: usize) -> Self {
        self.config.connection_queue_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
