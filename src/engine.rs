//! Engine Module
//!
//! The log handle that coordinates all components.
//!
//! ## Responsibilities
//! - Own the device, write buffer, read cache and flush worker
//! - Accept byte-granular appends (write-back)
//! - Serve byte-granular reads that observe every prior append
//! - Shut the worker down and drain pending bytes on close

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{error, info, trace};

use crate::config::Config;
use crate::device::{BlockDevice, FileDevice};
use crate::error::{alloc_zeroed, LogError, Result};
use crate::flush::{spawn_worker, Coordinator, FlushEngine, WorkerState};
use crate::read_cache::ReadCache;
use crate::write_buffer::WriteBuffer;

/// Point-in-time counters for a log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogStats {
    /// Bytes durable on the device (logical log length)
    pub device_limit: u64,
    /// Bytes appended but not yet durable
    pub pending_bytes: u64,
    /// Total bytes accepted by `append`
    pub bytes_appended: u64,
    /// Read cache window `(start_addr, end_addr)`
    pub cache_window: (u64, u64),
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Flush rounds run by the worker
    pub flush_rounds: u64,
    pub failed_flush_rounds: u64,
    /// Read-modify-write merges into a partial trailing block
    pub merges: u64,
    pub worker_state: WorkerState,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_appended: u64,
    cache_hits: u64,
    cache_misses: u64,
    merges: u64,
}

/// Everything guarded by the log's single mutex
pub(crate) struct LogState<D: BlockDevice> {
    pub(crate) write_buffer: WriteBuffer,
    pub(crate) read_cache: ReadCache,
    pub(crate) coordinator: Coordinator,
    /// Bytes durable on the device; only the flush engine moves it
    pub(crate) device_limit: u64,
    pub(crate) device: D,
    counters: Counters,
}

impl<D: BlockDevice> LogState<D> {
    /// Drain the write buffer onto the device; returns bytes made durable
    pub(crate) fn flush_pending(&mut self) -> Result<usize> {
        if self.write_buffer.is_empty() {
            return Ok(0);
        }
        let mut flusher = FlushEngine::new(&mut self.device, &mut self.device_limit);
        let result = flusher.drain(&mut self.write_buffer);
        let merges = flusher.merges();
        self.counters.merges += merges;
        result
    }

    fn fill_read_cache(&mut self, offset: u64, want_end: u64) -> Result<()> {
        self.read_cache
            .fill(&mut self.device, offset, want_end, self.device_limit)?;
        let (start, end) = self.read_cache.window();
        trace!(start, end, "read cache filled");
        Ok(())
    }
}

/// The single lock plus the two conditions the worker protocol uses
pub(crate) struct LogShared<D: BlockDevice> {
    pub(crate) state: Mutex<LogState<D>>,
    /// Signalled when there is something to flush (or exit was requested)
    pub(crate) work_available: Condvar,
    /// Signalled after every flush round
    pub(crate) work_completed: Condvar,
}

/// An open log over a block device
///
/// ## Concurrency Model
///
/// Every operation runs under one mutex, so callers are safe but not
/// pipelined. `append` only blocks when the write buffer is full; `read`
/// blocks for a whole flush round when it misses the cache. The worker is
/// the only writer to the device.
pub struct LogEngine<D: BlockDevice = FileDevice> {
    shared: Arc<LogShared<D>>,
    worker: Option<JoinHandle<()>>,
    config: Config,
    block_size: u64,
}

impl LogEngine<FileDevice> {
    /// Open the file-backed device named in `config`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let device = FileDevice::open(&config.device_path, config.block_size)?;
        Self::with_device(device, config)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified device image
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().device_path(path).build();
        Self::open(config)
    }
}

impl<D: BlockDevice> LogEngine<D> {
    /// Build a log on an already open device and start its flush worker
    ///
    /// The logical length starts at 0 whatever the device holds.
    pub fn with_device(device: D, config: Config) -> Result<Self> {
        config.validate()?;
        let block_size = device.block_size();

        let write_capacity = cache_bytes(config.write_cache_blocks, block_size, "write")?;
        let read_capacity = cache_bytes(config.read_cache_blocks, block_size, "read")?;

        let state = LogState {
            write_buffer: WriteBuffer::new(write_capacity)?,
            read_cache: ReadCache::new(read_capacity)?,
            coordinator: Coordinator::new(),
            device_limit: 0,
            device,
            counters: Counters::default(),
        };

        let shared = Arc::new(LogShared {
            state: Mutex::new(state),
            work_available: Condvar::new(),
            work_completed: Condvar::new(),
        });
        let worker = spawn_worker(Arc::clone(&shared), &config.worker_thread_name)?;

        info!(block_size, write_capacity, read_capacity, "log opened");

        Ok(Self {
            shared,
            worker: Some(worker),
            config,
            block_size,
        })
    }

    /// Append `data` to the end of the log
    ///
    /// Returns once the bytes are buffered, not once they are durable.
    /// Blocks on a forced flush when the write buffer lacks room.
    pub fn append(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut state = self.shared.state.lock();
        let capacity = state.write_buffer.capacity();
        if data.len() > capacity {
            return Err(LogError::InvalidArgument(format!(
                "append of {} bytes exceeds write buffer capacity {}",
                data.len(),
                capacity
            )));
        }

        // The lock is released while a forced flush waits, so other appenders
        // may grow `pending` in between. Re-check capacity every round.
        loop {
            let device_size = state.device.size();
            let requested =
                state.device_limit + state.write_buffer.pending() as u64 + data.len() as u64;
            if requested > device_size {
                return Err(LogError::DeviceFull {
                    requested,
                    capacity: device_size,
                });
            }
            if state.write_buffer.free() >= data.len() {
                break;
            }
            self.force_flush(&mut state)?;
        }

        state.write_buffer.push(data)?;
        state.counters.bytes_appended += data.len() as u64;
        state.coordinator.notify_append();
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Fill `buf` with log bytes starting at `offset`
    ///
    /// Fails with `OutOfRange` (copying nothing) if the range reaches past
    /// the durable length after all earlier appends are flushed.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let len = buf.len() as u64;
        let mut state = self.shared.state.lock();

        if state.read_cache.contains(offset, len) {
            let copied = state.read_cache.copy_out(offset, buf);
            debug_assert_eq!(copied, buf.len());
            state.counters.cache_hits += 1;
            return Ok(());
        }

        self.force_flush(&mut state)?;

        let limit = state.device_limit;
        let end = range_end(offset, len, limit)?;
        state.counters.cache_misses += 1;

        // Ranges larger than the cache are served one window at a time.
        let mut copied = 0;
        while copied < buf.len() {
            let pos = offset + copied as u64;
            let mut n = state.read_cache.copy_out(pos, &mut buf[copied..]);
            if n == 0 {
                state.fill_read_cache(pos, end)?;
                n = state.read_cache.copy_out(pos, &mut buf[copied..]);
                if n == 0 {
                    return Err(LogError::OutOfRange {
                        offset: pos,
                        len: end - pos,
                        limit,
                    });
                }
            }
            copied += n;
        }
        Ok(())
    }

    /// Read `len` bytes at `offset` into a new buffer
    ///
    /// A range past everything appended so far fails with `OutOfRange`
    /// before any buffer is allocated.
    pub fn read_bytes(&self, offset: u64, len: usize) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        {
            let state = self.shared.state.lock();
            let appended = state.device_limit + state.write_buffer.pending() as u64;
            range_end(offset, len as u64, appended)?;
        }
        let mut buf = alloc_zeroed(len, "read buffer")?;
        self.read(&mut buf, offset)?;
        Ok(Bytes::from(buf))
    }

    /// Force a flush round and wait until it lands
    pub fn flush(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.force_flush(&mut state)
    }

    /// Stop the worker after a final drain and sync the device
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Device block size
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Bytes durable on the device
    pub fn device_limit(&self) -> u64 {
        self.shared.state.lock().device_limit
    }

    /// Bytes buffered but not yet durable
    pub fn pending_bytes(&self) -> u64 {
        self.shared.state.lock().write_buffer.pending() as u64
    }

    /// Write buffer capacity in bytes
    pub fn write_capacity(&self) -> usize {
        self.shared.state.lock().write_buffer.capacity()
    }

    /// Snapshot of the log's counters
    pub fn stats(&self) -> LogStats {
        let state = self.shared.state.lock();
        LogStats {
            device_limit: state.device_limit,
            pending_bytes: state.write_buffer.pending() as u64,
            bytes_appended: state.counters.bytes_appended,
            cache_window: state.read_cache.window(),
            cache_hits: state.counters.cache_hits,
            cache_misses: state.counters.cache_misses,
            flush_rounds: state.coordinator.rounds_run(),
            failed_flush_rounds: state.coordinator.rounds_failed(),
            merges: state.counters.merges,
            worker_state: state.coordinator.state(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Request a round and wait, under the lock, until it completes
    fn force_flush(&self, state: &mut MutexGuard<'_, LogState<D>>) -> Result<()> {
        let ticket = state.coordinator.request_round();
        self.shared.work_available.notify_one();

        while !state.coordinator.round_done(ticket) {
            if state.coordinator.is_exited() {
                return Err(LogError::WorkerStopped);
            }
            self.shared.work_completed.wait(state);
        }
        state.coordinator.round_result(ticket)
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let ticket = self.shared.state.lock().coordinator.request_exit();
        self.shared.work_available.notify_all();

        if worker.join().is_err() {
            error!("flush worker panicked");
            return Err(LogError::WorkerStopped);
        }

        let mut state = self.shared.state.lock();
        let drained = state.coordinator.round_result(ticket);
        state.device.sync()?;
        info!(
            device_limit = state.device_limit,
            pending = state.write_buffer.pending(),
            "log closed"
        );
        drained
    }
}

impl<D: BlockDevice> Drop for LogEngine<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "log shutdown failed");
        }
    }
}

/// End of `[offset, offset + len)` if it lies within `limit`
fn range_end(offset: u64, len: u64, limit: u64) -> Result<u64> {
    offset
        .checked_add(len)
        .filter(|&end| end <= limit)
        .ok_or(LogError::OutOfRange {
            offset,
            len,
            limit,
        })
}

/// Cache size in bytes for `blocks` device blocks
fn cache_bytes(blocks: usize, block_size: u64, which: &str) -> Result<usize> {
    (blocks as u64)
        .checked_mul(block_size)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or_else(|| {
            LogError::OutOfMemory(format!(
                "{which} cache of {blocks} blocks x {block_size} bytes is too large"
            ))
        })
}
