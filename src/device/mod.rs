//! Device Module
//!
//! The block device the log sits on top of.
//!
//! ## Contract
//! - Fixed block size for the lifetime of the handle
//! - Reads and writes must start on a block boundary and cover whole blocks
//! - Capacity (`size`) is a multiple of the block size
//!
//! Closing a device is dropping it.

mod file;
mod memory;

pub use file::FileDevice;
pub use memory::{FaultSwitch, MemDevice};

use crate::error::{LogError, Result};

/// Block-aligned storage the log persists into
pub trait BlockDevice: Send + 'static {
    /// Block size in bytes
    fn block_size(&self) -> u64;

    /// Device capacity in bytes
    fn size(&self) -> u64;

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Write all of `buf` starting at `offset`
    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    /// Push written blocks to stable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Validate that an access is block-aligned and inside the device.
pub(crate) fn check_access(block_size: u64, size: u64, offset: u64, len: usize) -> Result<()> {
    let len = len as u64;
    if offset % block_size != 0 || len % block_size != 0 {
        return Err(LogError::Misaligned {
            offset,
            len,
            block_size,
        });
    }
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(LogError::OutOfRange {
            offset,
            len,
            limit: size,
        }),
    }
}

/// Validate a block size handed to a device constructor.
pub(crate) fn check_block_size(block_size: u64) -> Result<()> {
    if block_size == 0 || !block_size.is_power_of_two() {
        return Err(LogError::InvalidArgument(format!(
            "block size must be a non-zero power of two, got {block_size}"
        )));
    }
    Ok(())
}
