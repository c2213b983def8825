//! In-memory block device
//!
//! Clones share the same backing bytes, so a test can hand one clone to the
//! log and keep another to inspect raw blocks or inject I/O failures.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{alloc_zeroed, LogError, Result};

use super::{check_access, check_block_size, BlockDevice};

/// Toggles that make subsequent device calls fail
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl FaultSwitch {
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct Shared {
    bytes: Mutex<Vec<u8>>,
    block_reads: AtomicU64,
    block_writes: AtomicU64,
}

/// A RAM-backed block device
#[derive(Debug, Clone)]
pub struct MemDevice {
    shared: Arc<Shared>,
    faults: FaultSwitch,
    block_size: u64,
    size: u64,
}

impl MemDevice {
    /// Create a zeroed device of `blocks` blocks
    pub fn new(block_size: u64, blocks: u64) -> Result<Self> {
        check_block_size(block_size)?;
        let size = block_size.checked_mul(blocks).ok_or_else(|| {
            LogError::InvalidArgument(format!("{blocks} blocks of {block_size} bytes overflows"))
        })?;
        let len = usize::try_from(size).map_err(|_| {
            LogError::OutOfMemory(format!("memory device of {size} bytes is too large"))
        })?;
        let bytes = alloc_zeroed(len, "memory device")?;

        Ok(Self {
            shared: Arc::new(Shared {
                bytes: Mutex::new(bytes),
                block_reads: AtomicU64::new(0),
                block_writes: AtomicU64::new(0),
            }),
            faults: FaultSwitch::default(),
            block_size,
            size,
        })
    }

    /// Fault injection handle shared by all clones
    pub fn faults(&self) -> FaultSwitch {
        self.faults.clone()
    }

    /// Copy of the raw bytes in `[offset, offset + len)`, ignoring alignment
    pub fn snapshot(&self, offset: u64, len: usize) -> Vec<u8> {
        let bytes = self.shared.bytes.lock();
        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        bytes[start..end].to_vec()
    }

    /// Number of blocks read so far
    pub fn block_reads(&self) -> u64 {
        self.shared.block_reads.load(Ordering::SeqCst)
    }

    /// Number of blocks written so far
    pub fn block_writes(&self) -> u64 {
        self.shared.block_writes.load(Ordering::SeqCst)
    }
}

impl BlockDevice for MemDevice {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        check_access(self.block_size, self.size, offset, buf.len())?;
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure").into());
        }

        let start = offset as usize;
        let bytes = self.shared.bytes.lock();
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        self.shared
            .block_reads
            .fetch_add(buf.len() as u64 / self.block_size, Ordering::SeqCst);
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        check_access(self.block_size, self.size, offset, buf.len())?;
        if self.faults.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure").into());
        }

        let start = offset as usize;
        let mut bytes = self.shared.bytes.lock();
        bytes[start..start + buf.len()].copy_from_slice(buf);
        self.shared
            .block_writes
            .fetch_add(buf.len() as u64 / self.block_size, Ordering::SeqCst);
        Ok(())
    }
}
