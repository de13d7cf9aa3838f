//! Rate-limited diagnostics for sink failures
//!
//! A failing sink (disk full, closed pipe) fails every flush. The worker
//! reports through this logger so at most one `tracing::error!` is emitted
//! per interval, carrying the number of failures swallowed in between.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between two reported failures
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Emits at most one error event per interval
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_emit: Mutex<Option<Instant>>,

    /// Failures since the last emitted event
    suppressed: AtomicU64,

    /// Failures ever recorded
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: Mutex::new(None),
            suppressed: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Count a failure and log it unless one was logged within the interval
    ///
    /// Returns true if an event was emitted.
    pub fn error(&self, what: &str, error: &dyn std::fmt::Display) -> bool {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.try_claim_slot() {
            return false;
        }

        let count = self.suppressed.swap(0, Ordering::Relaxed);
        tracing::error!(
            what = %what,
            error = %error,
            suppressed = count.saturating_sub(1),
            total_errors = total,
            "log sink failure"
        );
        true
    }

    fn try_claim_slot(&self) -> bool {
        let mut last = self.last_emit.lock();
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Failures recorded since the last emitted event
    pub fn pending(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}
