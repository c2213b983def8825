//! Error types for blocklog
//!
//! Provides a unified error type for all log operations.

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for blocklog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Range out of bounds: offset={offset} len={len} limit={limit}")]
    OutOfRange { offset: u64, len: u64, limit: u64 },

    // -------------------------------------------------------------------------
    // Device Errors
    // -------------------------------------------------------------------------
    #[error("Misaligned device access: offset={offset} len={len} block_size={block_size}")]
    Misaligned {
        offset: u64,
        len: u64,
        block_size: u64,
    },

    #[error("Device full: {requested} bytes requested, capacity {capacity}")]
    DeviceFull { requested: u64, capacity: u64 },

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Flush worker has stopped")]
    WorkerStopped,
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting.
pub(crate) fn alloc_zeroed(len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| LogError::OutOfMemory(format!("{what} ({len} bytes): {e}")))?;
    buf.resize(len, 0);
    Ok(buf)
}
