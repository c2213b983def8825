//! # blocklog
//!
//! A log-structured storage layer over a raw block device:
//! - Byte-granular appends, buffered in a circular write buffer
//! - Byte-granular reads served from a block-aligned read cache
//! - A background flush thread that merges new bytes into the device's
//!   partly filled last block
//! - Forced flush-and-wait for reads that must observe every prior append
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Caller Threads                          │
//! │                 append()        read()                      │
//! └───────────┬──────────────────────────┬──────────────────────┘
//!             │                          │ miss → force flush
//!             ▼                          ▼
//!   ┌──────────────────┐        ┌──────────────────┐
//!   │   Write Buffer   │        │    Read Cache    │
//!   │   (circular)     │        │  (one window)    │
//!   └────────┬─────────┘        └────────▲─────────┘
//!            │ drain                     │ fill
//!            ▼                           │
//!   ┌──────────────────┐                 │
//!   │   Flush Worker   │                 │
//!   │ (merge + align)  │                 │
//!   └────────┬─────────┘                 │
//!            ▼                           │
//!   ┌─────────────────────────────────────┴──┐
//!   │              Block Device              │
//!   └────────────────────────────────────────┘
//! ```
//!
//! ## Limitations
//! The logical length (`device_limit`) lives in memory only. Every open
//! starts a fresh log at offset 0 over whatever the device already holds.
//! Forced flush waits cannot be cancelled or timed out.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod device;
pub mod write_buffer;
pub mod read_cache;
pub mod flush;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::Config;
pub use device::{BlockDevice, FileDevice, MemDevice};
pub use engine::{LogEngine, LogStats};
pub use flush::WorkerState;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blocklog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
