//! Tests for LogEngine
//!
//! These tests verify:
//! - Append/flush/read round trips
//! - Merging into a partly filled trailing block
//! - Write buffer wrap-around and forced flushes under pressure
//! - Read cache windows and out-of-range reads
//! - Error propagation from the device
//! - Shutdown draining pending bytes

use std::thread;
use std::time::{Duration, Instant};

use blocklog::{Config, LogEngine, LogError, MemDevice};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_log(
    write_blocks: usize,
    read_blocks: usize,
    device_blocks: u64,
) -> (MemDevice, LogEngine<MemDevice>) {
    let device = MemDevice::new(512, device_blocks).unwrap();
    let disk = device.clone();
    let config = Config::builder()
        .write_cache_blocks(write_blocks)
        .read_cache_blocks(read_blocks)
        .build();
    let log = LogEngine::with_device(device, config).unwrap();
    (disk, log)
}

fn setup_default_log() -> (MemDevice, LogEngine<MemDevice>) {
    setup_log(32, 256, 256)
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(17).wrapping_add(seed))
        .collect()
}

fn read_vec(log: &LogEngine<MemDevice>, offset: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    log.read(&mut buf, offset).unwrap();
    buf
}

// =============================================================================
// Basic Round Trip Tests
// =============================================================================

#[test]
fn test_hello_world_then_merge() {
    let (disk, log) = setup_default_log();
    assert_eq!(log.write_capacity(), 16384);

    log.append(b"HelloWorld").unwrap();
    log.flush().unwrap();
    assert_eq!(read_vec(&log, 0, 10), b"HelloWorld");
    assert_eq!(log.device_limit(), 10);

    let more = pattern(600, 5);
    log.append(&more).unwrap();
    log.flush().unwrap();

    assert_eq!(log.device_limit(), 610);
    assert_eq!(log.stats().merges, 1);

    let mut expected = b"HelloWorld".to_vec();
    expected.extend_from_slice(&more);
    assert_eq!(read_vec(&log, 0, 610), expected);

    // Block 0 is full, block 1 holds the last 98 bytes then zero padding.
    let raw = disk.snapshot(0, 1024);
    assert_eq!(&raw[..610], expected.as_slice());
    assert!(raw[610..].iter().all(|&b| b == 0));
}

#[test]
fn test_many_small_appends_round_trip() {
    let (_disk, log) = setup_default_log();
    let mut expected = Vec::new();

    for i in 0..500u32 {
        let record = format!("record-{i};");
        log.append(record.as_bytes()).unwrap();
        expected.extend_from_slice(record.as_bytes());
    }
    log.flush().unwrap();

    assert_eq!(log.device_limit(), expected.len() as u64);
    assert_eq!(read_vec(&log, 0, expected.len()), expected);
}

#[test]
fn test_read_sees_unflushed_append() {
    let (_disk, log) = setup_default_log();

    log.append(b"first").unwrap();
    assert_eq!(read_vec(&log, 0, 5), b"first");

    log.append(b"second").unwrap();
    // The cache window ends at 5, so this read must flush first.
    assert_eq!(read_vec(&log, 5, 6), b"second");
}

#[test]
fn test_read_bytes() {
    let (_disk, log) = setup_default_log();
    log.append(b"0123456789").unwrap();

    let bytes = log.read_bytes(3, 4).unwrap();
    assert_eq!(&bytes[..], b"3456");
}

#[test]
fn test_empty_append_and_read_are_noops() {
    let (_disk, log) = setup_default_log();

    log.append(b"").unwrap();
    let mut empty = [0u8; 0];
    log.read(&mut empty, 0).unwrap();

    assert_eq!(log.stats().bytes_appended, 0);
    assert_eq!(log.device_limit(), 0);
}

#[test]
fn test_empty_read_past_limit_is_noop() {
    let (_disk, log) = setup_default_log();

    let mut empty = [0u8; 0];
    log.read(&mut empty, 1000).unwrap();
    assert!(log.read_bytes(1000, 0).unwrap().is_empty());

    assert_eq!(log.stats().flush_rounds, 0);
}

#[test]
fn test_read_bytes_huge_len_is_out_of_range() {
    let (_disk, log) = setup_default_log();
    log.append(b"abc").unwrap();

    assert!(matches!(
        log.read_bytes(0, usize::MAX),
        Err(LogError::OutOfRange {
            offset: 0,
            limit: 3,
            ..
        })
    ));
    assert_eq!(&log.read_bytes(0, 3).unwrap()[..], b"abc");
}

// =============================================================================
// Write Buffer Tests
// =============================================================================

#[test]
fn test_append_larger_than_buffer_rejected() {
    let (_disk, log) = setup_log(2, 4, 64);

    let result = log.append(&vec![1u8; 1025]);
    assert!(matches!(result, Err(LogError::InvalidArgument(_))));
    assert_eq!(log.pending_bytes(), 0);
    assert_eq!(log.stats().bytes_appended, 0);
}

#[test]
fn test_append_exactly_buffer_capacity() {
    let (_disk, log) = setup_log(2, 4, 64);
    let data = pattern(1024, 9);

    log.append(&data).unwrap();
    log.flush().unwrap();

    assert_eq!(read_vec(&log, 0, 1024), data);
}

#[test]
fn test_wrap_around_round_trip() {
    let (_disk, log) = setup_log(2, 4, 64);
    let first = pattern(700, 1);
    let second = pattern(500, 2);

    log.append(&first).unwrap();
    log.flush().unwrap();
    // 324 bytes land at the buffer end, 176 wrap to the start.
    log.append(&second).unwrap();
    log.flush().unwrap();

    let mut expected = first.clone();
    expected.extend_from_slice(&second);
    assert_eq!(log.device_limit(), 1200);
    assert_eq!(read_vec(&log, 0, 1200), expected);
}

#[test]
fn test_full_buffer_forces_flush() {
    let (_disk, log) = setup_log(2, 4, 64);
    let a = pattern(800, 3);
    let b = pattern(800, 4);

    log.append(&a).unwrap();
    log.append(&b).unwrap();
    assert!(log.pending_bytes() <= 1024);

    let mut expected = a.clone();
    expected.extend_from_slice(&b);
    assert_eq!(read_vec(&log, 0, 1600), expected);
}

#[test]
fn test_append_beyond_device_capacity() {
    let (_disk, log) = setup_log(4, 4, 4);

    log.append(&vec![7u8; 2000]).unwrap();
    let result = log.append(&[0u8; 100]);

    assert!(matches!(
        result,
        Err(LogError::DeviceFull {
            requested: 2100,
            capacity: 2048
        })
    ));
    log.append(&[8u8; 48]).unwrap();
    log.flush().unwrap();
    assert_eq!(log.device_limit(), 2048);
}

#[test]
fn test_background_worker_flushes_without_request() {
    let (_disk, log) = setup_default_log();
    log.append(b"eventually durable").unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while log.device_limit() < 18 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(log.device_limit(), 18);
    assert_eq!(log.pending_bytes(), 0);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_with_nothing_pending_is_noop() {
    let (disk, log) = setup_default_log();
    log.append(b"abc").unwrap();
    log.flush().unwrap();
    let writes = disk.block_writes();

    log.flush().unwrap();
    log.flush().unwrap();

    assert_eq!(log.device_limit(), 3);
    assert_eq!(disk.block_writes(), writes);
}

#[test]
fn test_device_limit_is_monotonic() {
    let (_disk, log) = setup_log(2, 2, 256);
    let mut last = 0;
    let mut appended = 0u64;

    for i in 0..200usize {
        let chunk = pattern(1 + (i * 37) % 300, i as u8);
        log.append(&chunk).unwrap();
        appended += chunk.len() as u64;

        let limit = log.device_limit();
        assert!(limit >= last);
        assert!(limit <= appended);
        last = limit;
    }
}

// =============================================================================
// Read Cache Tests
// =============================================================================

#[test]
fn test_read_past_limit_copies_nothing() {
    let (_disk, log) = setup_default_log();
    log.append(b"HelloWorld").unwrap();

    let mut buf = [0xEEu8; 10];
    let result = log.read(&mut buf, 5);

    assert!(matches!(
        result,
        Err(LogError::OutOfRange {
            offset: 5,
            len: 10,
            limit: 10
        })
    ));
    assert_eq!(buf, [0xEEu8; 10]);
}

#[test]
fn test_read_hits_cache_after_fill() {
    let (_disk, log) = setup_default_log();
    log.append(&pattern(3000, 1)).unwrap();

    // The window covers only the blocks of the requested range.
    read_vec(&log, 0, 100);
    assert_eq!(log.stats().cache_window, (0, 512));
    let before = log.stats();

    read_vec(&log, 200, 100);
    let after_hit = log.stats();
    assert_eq!(after_hit.cache_hits, before.cache_hits + 1);
    assert_eq!(after_hit.cache_misses, before.cache_misses);

    read_vec(&log, 2900, 100);
    assert_eq!(log.stats().cache_misses, before.cache_misses + 1);
}

#[test]
fn test_cache_window_never_exceeds_limit() {
    let (_disk, log) = setup_default_log();
    log.append(&pattern(700, 2)).unwrap();
    read_vec(&log, 600, 50);

    let stats = log.stats();
    let (start, end) = stats.cache_window;
    assert_eq!(start, 512);
    assert!(start <= end && end <= stats.device_limit);
    assert_eq!(end, 700);
}

#[test]
fn test_read_larger_than_cache() {
    let (_disk, log) = setup_log(4, 1, 64);
    let data = pattern(3000, 6);
    for piece in data.chunks(1000) {
        log.append(piece).unwrap();
    }

    assert_eq!(read_vec(&log, 100, 2500), &data[100..2600]);
    assert_eq!(read_vec(&log, 0, 3000), data);
}

// =============================================================================
// Error Propagation Tests
// =============================================================================

#[test]
fn test_flush_write_failure_surfaces_and_recovers() {
    let (disk, log) = setup_default_log();
    disk.faults().fail_writes(true);

    log.append(b"retry me").unwrap();
    assert!(matches!(log.flush(), Err(LogError::Io(_))));
    assert_eq!(log.device_limit(), 0);
    assert_eq!(log.pending_bytes(), 8);

    disk.faults().fail_writes(false);
    log.flush().unwrap();

    assert_eq!(read_vec(&log, 0, 8), b"retry me");
    assert!(log.stats().failed_flush_rounds >= 1);
}

#[test]
fn test_cache_fill_failure_surfaces() {
    let (disk, log) = setup_default_log();
    log.append(b"HelloWorld").unwrap();
    log.flush().unwrap();

    disk.faults().fail_reads(true);
    let mut buf = [0u8; 4];
    assert!(matches!(log.read(&mut buf, 0), Err(LogError::Io(_))));

    disk.faults().fail_reads(false);
    log.read(&mut buf, 0).unwrap();
    assert_eq!(&buf, b"Hell");
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_close_drains_pending_bytes() {
    let (disk, log) = setup_default_log();
    log.append(b"written at close").unwrap();

    log.close().unwrap();

    assert_eq!(disk.snapshot(0, 16), b"written at close");
}

#[test]
fn test_drop_drains_pending_bytes() {
    let (disk, log) = setup_default_log();
    log.append(&pattern(1500, 8)).unwrap();

    drop(log);

    assert_eq!(disk.snapshot(0, 1500), pattern(1500, 8));
}

#[test]
fn test_close_reports_failed_final_drain() {
    let (disk, log) = setup_default_log();
    disk.faults().fail_writes(true);
    log.append(b"lost").unwrap();

    assert!(matches!(log.close(), Err(LogError::Io(_))));
}

#[test]
fn test_reopen_starts_fresh_log() {
    let (disk, log) = setup_default_log();
    log.append(b"old contents").unwrap();
    log.close().unwrap();

    let log = LogEngine::with_device(disk.clone(), Config::default()).unwrap();
    assert_eq!(log.device_limit(), 0);

    let mut buf = [0u8; 1];
    assert!(matches!(
        log.read(&mut buf, 0),
        Err(LogError::OutOfRange { .. })
    ));

    log.append(b"new").unwrap();
    log.flush().unwrap();
    assert_eq!(disk.snapshot(0, 12), b"new\0\0\0\0\0\0\0\0\0");
}
