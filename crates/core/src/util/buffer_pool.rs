//! Lock-free pool of record buffers
//!
//! Producers take a `BytesMut` from the pool, encode one record into it and
//! hand it to the core. The worker copies the bytes into its accumulator and
//! returns the buffer here, so steady-state logging allocates nothing per
//! record.
//!
//! ```text
//! [producer] --get()--> [encode] --write()--> [queue] --> [worker] --put()--> [pool]
//! ```

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free pool of reusable record buffers
///
/// Buffers are pre-allocated at construction. An empty pool falls back to
/// allocating; a full pool drops returned buffers.
pub struct BufferPool {
    queue: ArrayQueue<BytesMut>,

    /// Capacity pre-allocated for each buffer
    record_capacity: usize,

    metrics: BufferPoolMetrics,
}

/// Counters for pool effectiveness
#[derive(Debug, Default)]
pub struct BufferPoolMetrics {
    /// Buffers served from the pool
    pub hits: AtomicU64,

    /// Buffers allocated because the pool was empty
    pub misses: AtomicU64,

    /// Buffers returned to the pool
    pub returns: AtomicU64,

    /// Buffers discarded (pool full or undersized)
    pub drops: AtomicU64,
}

impl BufferPoolMetrics {
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BufferPoolMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub drops: u64,
}

impl PoolSnapshot {
    /// Fraction of `get` calls served without allocating (1.0 when idle)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl BufferPool {
    /// Create a pool holding `pool_size` buffers of `record_capacity` bytes
    ///
    /// A `pool_size` of zero is bumped to one; `ArrayQueue` cannot be empty.
    pub fn new(pool_size: usize, record_capacity: usize) -> Self {
        let queue = ArrayQueue::new(pool_size.max(1));
        while queue
            .push(BytesMut::with_capacity(record_capacity))
            .is_ok()
        {}

        Self {
            queue,
            record_capacity,
            metrics: BufferPoolMetrics::new(),
        }
    }

    /// Take an empty buffer, allocating if the pool ran dry
    #[inline]
    pub fn get(&self) -> BytesMut {
        match self.queue.pop() {
            Some(buf) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(self.record_capacity)
            }
        }
    }

    /// Clear a consumed buffer and keep it for reuse
    ///
    /// Buffers below `record_capacity` (e.g. split-off fragments) are not
    /// worth keeping and are dropped, as is anything beyond pool capacity.
    #[inline]
    pub fn put(&self, mut buf: BytesMut) {
        buf.clear();

        let kept = buf.capacity() >= self.record_capacity && self.queue.push(buf).is_ok();
        let counter = if kept {
            &self.metrics.returns
        } else {
            &self.metrics.drops
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Buffers currently idle in the pool
    #[inline]
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of pooled buffers
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[inline]
    pub fn record_capacity(&self) -> usize {
        self.record_capacity
    }

    #[inline]
    pub fn metrics(&self) -> &BufferPoolMetrics {
        &self.metrics
    }
}

#[cfg(test)]
#[path = "buffer_pool_test.rs"]
mod buffer_pool_test;
