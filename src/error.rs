//! Error types for kvdb
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvdbError
pub type Result<T> = std::result::Result<T, KvdbError>;

/// Unified error type for kvdb operations
#[derive(Debug, Error)]
pub enum KvdbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Key too long: {len} bytes (max 255)")]
    KeyTooLong { len: usize },

    #[error("Value too long: {len} bytes (max 255)")]
    ValueTooLong { len: usize },

    #[error("Response message too long: {len} bytes (max 255)")]
    MessageTooLong { len: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open WAL at {}: {source}", path.display())]
    WalOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAL write failed: {0}")]
    WalWrite(#[source] std::io::Error),

    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL is closed")]
    WalClosed,

    #[error("WAL is unusable: a failed record could not be removed")]
    WalFailed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvdbError {
    /// True for I/O errors that mean the peer went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            KvdbError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
