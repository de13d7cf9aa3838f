//! Counters for the async core
//!
//! Everything the write path swallows (sink failures, forced blocking,
//! timed-out shutdowns) is counted here so it stays visible.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by producers and the worker
#[derive(Debug, Default)]
pub struct CoreMetrics {
    /// Records handed to `write`
    pub records_received: AtomicU64,

    /// Records accepted by the pending queue
    pub records_enqueued: AtomicU64,

    /// Records written by the worker as part of a batch
    pub records_flushed: AtomicU64,

    /// Records written straight to the sink, bypassing the queue
    pub direct_writes: AtomicU64,

    /// Times a producer found the queue full and had to block
    pub queue_full: AtomicU64,

    /// Batched sink writes performed by the worker
    pub flushes: AtomicU64,

    /// Bytes written by batched flushes
    pub bytes_flushed: AtomicU64,

    /// Failed sink writes or syncs (data of that call is lost)
    pub write_errors: AtomicU64,

    /// Shutdowns that gave up waiting for the worker
    pub shutdown_timeouts: AtomicU64,
}

impl CoreMetrics {
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_enqueued: AtomicU64::new(0),
            records_flushed: AtomicU64::new(0),
            direct_writes: AtomicU64::new(0),
            queue_full: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            bytes_flushed: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            shutdown_timeouts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_direct(&self) {
        self.direct_writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one batched flush of `records` records totalling `bytes`
    #[inline]
    pub fn record_flush(&self, records: u64, bytes: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_flushed.fetch_add(records, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_shutdown_timeout(&self) {
        self.shutdown_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoreMetricsSnapshot {
        CoreMetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            direct_writes: self.direct_writes.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            shutdown_timeouts: self.shutdown_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CoreMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreMetricsSnapshot {
    pub records_received: u64,
    pub records_enqueued: u64,
    pub records_flushed: u64,
    pub direct_writes: u64,
    pub queue_full: u64,
    pub flushes: u64,
    pub bytes_flushed: u64,
    pub write_errors: u64,
    pub shutdown_timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        assert_eq!(CoreMetrics::new().snapshot(), CoreMetricsSnapshot::default());
    }

    #[test]
    fn test_record_flush_accumulates() {
        let metrics = CoreMetrics::new();
        metrics.record_flush(3, 120);
        metrics.record_flush(2, 80);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.flushes, 2);
        assert_eq!(snapshot.records_flushed, 5);
        assert_eq!(snapshot.bytes_flushed, 200);
    }
}
