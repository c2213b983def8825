//! Read Cache
//!
//! A single contiguous window mirroring durable device bytes
//! `[start_addr, end_addr)`. The window starts on a block boundary and ends
//! on one too, unless clipped at the log's durable length.

use crate::device::BlockDevice;
use crate::error::{alloc_zeroed, Result};

/// Block-aligned mirror of a slice of the device
pub struct ReadCache {
    data: Vec<u8>,
    start_addr: u64,
    end_addr: u64,
}

impl ReadCache {
    /// Allocate a cache of `capacity` bytes with an empty window
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: alloc_zeroed(capacity, "read cache")?,
            start_addr: 0,
            end_addr: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current window as `(start_addr, end_addr)`
    pub fn window(&self) -> (u64, u64) {
        (self.start_addr, self.end_addr)
    }

    /// Whether `[offset, offset + len)` lies inside the window
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        match offset.checked_add(len) {
            Some(end) => offset >= self.start_addr && end <= self.end_addr,
            None => false,
        }
    }

    /// Drop the window
    pub fn invalidate(&mut self) {
        self.start_addr = 0;
        self.end_addr = 0;
    }

    /// Replace the window with device bytes starting at the block holding
    /// `offset`, covering up to `want_end` and never past `device_limit`.
    pub fn fill<D: BlockDevice>(
        &mut self,
        device: &mut D,
        offset: u64,
        want_end: u64,
        device_limit: u64,
    ) -> Result<()> {
        let block_size = device.block_size();
        let start = offset - offset % block_size;
        let window = round_up(want_end, block_size)
            .saturating_sub(start)
            .min(self.capacity() as u64);
        let end = (start + window).min(device_limit);
        let read_len = round_up(end.saturating_sub(start), block_size) as usize;

        self.invalidate();
        if read_len > 0 {
            device.read(&mut self.data[..read_len], start)?;
        }
        self.start_addr = start;
        self.end_addr = end.max(start);
        Ok(())
    }

    /// Copy as much of the window as overlaps `[offset, offset + buf.len())`
    /// into `buf`, returning the number of bytes copied.
    ///
    /// Returns 0 when `offset` is outside the window.
    pub fn copy_out(&self, offset: u64, buf: &mut [u8]) -> usize {
        if offset < self.start_addr || offset >= self.end_addr {
            return 0;
        }
        let from = (offset - self.start_addr) as usize;
        let available = (self.end_addr - offset) as usize;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.data[from..from + n]);
        n
    }
}

/// Round `value` up to the next multiple of `block_size`
pub(crate) fn round_up(value: u64, block_size: u64) -> u64 {
    value.div_ceil(block_size) * block_size
}
