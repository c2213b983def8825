//! Write Buffer
//!
//! Fixed-capacity circular staging area for appended bytes that are not yet
//! durable on the device.
//!
//! ## Layout
//! ```text
//!   0          tail                 head          capacity
//!   ├───────────┼────────────────────┼───────────────┤
//!   │   free    │  pending (oldest → newest)  │  free │
//!   └───────────┴────────────────────┴───────────────┘
//! ```
//! Once `head` wraps, the pending region is `[tail, capacity) + [0, head)`.
//!
//! `head == tail` is ambiguous between empty and full, so the pending byte
//! count is tracked explicitly.

use std::ops::Range;

use crate::error::{alloc_zeroed, LogError, Result};

/// Circular byte buffer indexed by `head`/`tail` offsets
pub struct WriteBuffer {
    data: Vec<u8>,
    /// Next write position
    head: usize,
    /// Oldest pending byte
    tail: usize,
    /// Bytes between `tail` and `head` along the ring
    pending: usize,
}

impl WriteBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: alloc_zeroed(capacity, "write buffer")?,
            head: 0,
            tail: 0,
            pending: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes appended but not yet flushed
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Raw ring storage, for the flush engine
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy `bytes` in at `head`, splitting the copy at the ring end.
    ///
    /// The caller must have made room first; pending bytes are never
    /// overwritten.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.free() {
            return Err(LogError::InvalidArgument(format!(
                "{} bytes do not fit in {} free bytes of the write buffer",
                bytes.len(),
                self.free()
            )));
        }

        let capacity = self.capacity();
        let first = bytes.len().min(capacity - self.head);
        self.data[self.head..self.head + first].copy_from_slice(&bytes[..first]);

        let wrapped = bytes.len() - first;
        if wrapped > 0 {
            self.data[..wrapped].copy_from_slice(&bytes[first..]);
        }

        self.head = (self.head + bytes.len()) % capacity;
        self.pending += bytes.len();
        Ok(())
    }

    /// The pending region as at most two linear ranges, oldest first
    pub fn pending_ranges(&self) -> (Range<usize>, Option<Range<usize>>) {
        if self.pending == 0 {
            return (self.tail..self.tail, None);
        }
        let end = self.tail + self.pending;
        if end <= self.capacity() {
            (self.tail..end, None)
        } else {
            (self.tail..self.capacity(), Some(0..self.head))
        }
    }

    /// Release `n` of the oldest pending bytes after they became durable
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.pending, "consumed more than pending");
        let n = n.min(self.pending);
        self.tail = (self.tail + n) % self.capacity();
        self.pending -= n;
    }
}
