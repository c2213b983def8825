//! Flush Module
//!
//! Moves appended bytes from the write buffer onto the device.
//!
//! ## Responsibilities
//! - Block-align byte-granular appends, merging into a partly filled last block
//! - Split a wrapped write-buffer region into two ordered writes
//! - Run flushes on a single background thread
//! - Let callers force a flush and wait for it to land
//!
//! ## Worker States
//! ```text
//!            flush requested
//!   ┌──────┐ ──────────────▶ ┌──────────┐
//!   │ Idle │                 │ Flushing │
//!   └──────┘ ◀────────────── └──────────┘
//!      │       round done         │
//!      └──────────┬───────────────┘
//!                 │ should_exit (after a final drain)
//!                 ▼
//!            ┌─────────┐
//!            │ Exiting │
//!            └─────────┘
//! ```

mod coordinator;
mod engine;
mod worker;

pub use coordinator::WorkerState;

pub(crate) use coordinator::Coordinator;
pub(crate) use engine::FlushEngine;
pub(crate) use worker::spawn as spawn_worker;
