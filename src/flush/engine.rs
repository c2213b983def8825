//! Flush Engine
//!
//! Turns byte ranges staged in memory into block-aligned device writes.
//!
//! ## Algorithm
//! 1. If the last durable block is only partly filled (`slack > 0`), read it
//!    back, overlay as many new bytes as fit, and write it out again.
//! 2. If what remains does not start on a block boundary in memory, copy it
//!    into a scratch buffer and continue from there.
//! 3. Write the whole blocks straight from memory; a trailing partial block
//!    goes out zero-padded.
//!
//! `device_limit` moves forward after every successful device write and only
//! by the number of logical bytes that write covered, so the next flush sees
//! the true partial-fill boundary.

use std::borrow::Cow;
use std::ops::Range;

use tracing::trace;

use crate::device::BlockDevice;
use crate::error::{alloc_zeroed, Result};
use crate::write_buffer::WriteBuffer;

/// A linear source range, either in the write buffer or in a scratch copy
struct Segment<'m> {
    memory: Cow<'m, [u8]>,
    range: Range<usize>,
}

/// Writes staged bytes to the device and tracks the durable length
pub(crate) struct FlushEngine<'a, D: BlockDevice> {
    device: &'a mut D,
    device_limit: &'a mut u64,
    block_size: usize,
    merges: u64,
}

impl<'a, D: BlockDevice> FlushEngine<'a, D> {
    pub(crate) fn new(device: &'a mut D, device_limit: &'a mut u64) -> Self {
        let block_size = device.block_size() as usize;
        Self {
            device,
            device_limit,
            block_size,
            merges: 0,
        }
    }

    /// Read-modify-write merges performed by this engine
    pub(crate) fn merges(&self) -> u64 {
        self.merges
    }

    /// Make the whole pending region of `buffer` durable, oldest bytes first.
    ///
    /// A wrapped region is flushed as `[tail, capacity)` then `[0, head)`.
    /// The buffer releases exactly the bytes that reached the device, even
    /// when a device call fails part way; the error is still returned.
    pub(crate) fn drain(&mut self, buffer: &mut WriteBuffer) -> Result<usize> {
        let before = *self.device_limit;
        let (first, second) = buffer.pending_ranges();

        let mut result = self.flush(buffer.as_slice(), first);
        if result.is_ok() {
            if let Some(second) = second {
                result = self.flush(buffer.as_slice(), second);
            }
        }

        let durable = (*self.device_limit - before) as usize;
        buffer.consume(durable);
        result.map(|()| durable)
    }

    /// Append `memory[range]` to the device at `device_limit`
    pub(crate) fn flush(&mut self, memory: &[u8], range: Range<usize>) -> Result<()> {
        if range.is_empty() {
            return Ok(());
        }

        let mut work = vec![Segment {
            memory: Cow::Borrowed(memory),
            range,
        }];

        while let Some(mut segment) = work.pop() {
            let slack = (*self.device_limit % self.block_size as u64) as usize;
            if slack > 0 && !segment.range.is_empty() {
                let merged = self.merge_into_slack(&segment.memory[segment.range.clone()], slack)?;
                segment.range.start += merged;
            }
            if segment.range.is_empty() {
                continue;
            }

            if segment.range.start % self.block_size != 0 {
                let src = &segment.memory[segment.range.clone()];
                let mut scratch = alloc_zeroed(src.len(), "flush scratch")?;
                scratch.copy_from_slice(src);
                let len = scratch.len();
                work.push(Segment {
                    memory: Cow::Owned(scratch),
                    range: 0..len,
                });
                continue;
            }

            self.write_blocks(&segment.memory[segment.range.clone()])?;
        }

        Ok(())
    }

    /// Fill the unused tail of the last durable block; returns bytes consumed
    fn merge_into_slack(&mut self, src: &[u8], slack: usize) -> Result<usize> {
        let block_start = *self.device_limit - slack as u64;
        let mut block = alloc_zeroed(self.block_size, "merge block")?;
        self.device.read(&mut block, block_start)?;

        let n = (self.block_size - slack).min(src.len());
        block[slack..slack + n].copy_from_slice(&src[..n]);
        self.device.write(&block, block_start)?;

        trace!(block_start, slack, merged = n, "merged into partial block");
        *self.device_limit += n as u64;
        self.merges += 1;
        Ok(n)
    }

    /// Write `src` at the (block-aligned) `device_limit`
    fn write_blocks(&mut self, src: &[u8]) -> Result<()> {
        debug_assert_eq!(*self.device_limit % self.block_size as u64, 0);

        let whole = src.len() / self.block_size * self.block_size;
        if whole > 0 {
            self.device.write(&src[..whole], *self.device_limit)?;
            trace!(offset = *self.device_limit, len = whole, "wrote whole blocks");
            *self.device_limit += whole as u64;
        }

        let rest = &src[whole..];
        if !rest.is_empty() {
            let mut block = alloc_zeroed(self.block_size, "tail block")?;
            block[..rest.len()].copy_from_slice(rest);
            self.device.write(&block, *self.device_limit)?;
            trace!(offset = *self.device_limit, len = rest.len(), "wrote padded tail block");
            *self.device_limit += rest.len() as u64;
        }
        Ok(())
    }
}
