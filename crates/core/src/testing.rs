//! Test doubles shared by unit tests

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::async_core::{
    FLUSH_COMPLETED_NOTICE, FLUSH_TIMED_OUT_NOTICE, QUEUE_BLOCKED_NOTICE, WORKER_THREAD_NAME,
};
use crate::sink::Sink;

/// Sink that keeps every write call separately
#[derive(Default)]
pub(crate) struct RecordingSink {
    writes: Mutex<Vec<Vec<u8>>>,
    syncs: AtomicUsize,
    failing: AtomicBool,
    /// Remaining worker-thread writes to slow down, and by how much
    slow_worker_writes: AtomicUsize,
    slow_delay: Mutex<Duration>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delay the first `count` writes made by the worker thread
    ///
    /// Writes from other threads (notices, direct writes) stay fast.
    pub(crate) fn slow_worker(count: usize, delay: Duration) -> Arc<Self> {
        let sink = Self::default();
        sink.slow_worker_writes.store(count, Ordering::SeqCst);
        *sink.slow_delay.lock() = delay;
        Arc::new(sink)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every successful write call, in order
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// Write calls that carried record bytes rather than a notice
    pub(crate) fn batches(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| !is_notice(w))
            .collect()
    }

    /// Concatenated record bytes, notices excluded
    pub(crate) fn records(&self) -> Vec<u8> {
        self.batches().concat()
    }

    pub(crate) fn count_notice(&self, notice: &[u8]) -> usize {
        self.writes.lock().iter().filter(|w| w.as_slice() == notice).count()
    }

    pub(crate) fn syncs(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    fn should_delay(&self) -> Option<Duration> {
        if thread::current().name() != Some(WORKER_THREAD_NAME) {
            return None;
        }
        self.slow_worker_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| *self.slow_delay.lock())
    }
}

impl Sink for RecordingSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if let Some(delay) = self.should_delay() {
            thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other("sink unavailable"));
        }
        self.writes.lock().push(buf.to_vec());
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other("sink unavailable"));
        }
        Ok(())
    }
}

fn is_notice(write: &[u8]) -> bool {
    write == QUEUE_BLOCKED_NOTICE
        || write == FLUSH_COMPLETED_NOTICE
        || write == FLUSH_TIMED_OUT_NOTICE
}

/// Poll `condition` until it holds or `timeout` elapses
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
