//! Asynchronous batching core
//!
//! Producers hand fully-encoded records to [`AsyncCore::write`]. Records go
//! into a bounded queue; a single worker thread appends them to an
//! accumulator and writes the accumulator to the sink in one call whenever
//! it reaches `batch_size` bytes or the flush ticker fires.
//!
//! ```text
//! producers ──try_send──► [bounded queue] ──► worker ──batch──► Sink
//!     │  full: notice + blocking send            ▲
//!     │  stopped / panic-class: direct write ────┘ (same sink)
//! ```
//!
//! # Shutdown
//!
//! [`AsyncCore::close`] enqueues a shutdown sentinel behind all pending
//! records and waits, bounded by `shutdown_timeout`, for the worker to
//! drain and signal done. Either way a one-line notice is written to the
//! sink and the sink is synced; after a timeout both happen on a detached
//! thread, since the worker may still be blocked inside the sink. Records
//! written after shutdown started go straight to the sink, unbatched.
//! Records that raced into the queue behind the sentinel are written once
//! the worker has terminated.
//!
//! # Threading
//!
//! The worker holds no lock while writing, and producers write the notices
//! and post-shutdown records on their own threads. The sink therefore sees
//! concurrent calls, see [`Sink`].

mod metrics;
mod worker;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crossbeam::channel::{
    self, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use parking_lot::Mutex;
use spool_config::CoreConfig;

use crate::error::CoreError;
use crate::level::Level;
use crate::sink::Sink;
use crate::util::{BufferPool, PoolSnapshot, RateLimitedLogger};

pub use metrics::{CoreMetrics, CoreMetricsSnapshot};
pub(crate) use worker::WORKER_THREAD_NAME;
use worker::Worker;

/// Default queue capacity in records
pub const DEFAULT_QUEUE_CAPACITY: usize = 10240;

/// Default flush threshold (100 KiB)
pub const DEFAULT_BATCH_SIZE: usize = 100 * 1024;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of pooled record buffers
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Default capacity of a pooled record buffer
pub const DEFAULT_RECORD_CAPACITY: usize = 512;

/// Written when a producer has to block on a full queue
pub const QUEUE_BLOCKED_NOTICE: &[u8] = b"log queue blocked\n";

/// Written when the worker drained within the shutdown timeout
pub const FLUSH_COMPLETED_NOTICE: &[u8] = b"log flush completed\n";

/// Written when shutdown gave up waiting for the worker
pub const FLUSH_TIMED_OUT_NOTICE: &[u8] = b"log flush timed out, records may be lost\n";

/// How often a producer blocked on a full queue re-checks for shutdown
const BLOCKED_SEND_POLL: Duration = Duration::from_millis(50);

/// Name of the thread reporting a timed-out shutdown
const NOTICE_THREAD_NAME: &str = "spool-notice";

/// Runtime settings for [`AsyncCore`]
#[derive(Debug, Clone)]
pub struct AsyncCoreConfig {
    /// Maximum records pending between producers and the worker
    pub queue_capacity: usize,

    /// Accumulated bytes that trigger a flush
    pub batch_size: usize,

    /// Period of the flush ticker
    pub flush_interval: Duration,

    /// Upper bound on how long `close` waits for the worker
    pub shutdown_timeout: Duration,

    /// Recycled record buffers kept by the pool
    pub pool_size: usize,

    /// Initial capacity of each pooled buffer
    pub record_capacity: usize,

    /// Records below this level are discarded by the tracing writer
    pub min_level: Level,
}

impl Default for AsyncCoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            pool_size: DEFAULT_POOL_SIZE,
            record_capacity: DEFAULT_RECORD_CAPACITY,
            min_level: Level::Debug,
        }
    }
}

impl AsyncCoreConfig {
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, bytes: usize) -> Self {
        self.batch_size = bytes;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    #[must_use]
    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl From<&CoreConfig> for AsyncCoreConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            shutdown_timeout: config.shutdown_timeout,
            pool_size: config.pool_size,
            record_capacity: config.record_capacity,
            min_level: config.min_level.into(),
        }
    }
}

/// How a call to [`AsyncCore::close`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The worker drained every pending record and exited
    Flushed,

    /// The timeout elapsed first; pending records may be lost
    TimedOut,

    /// Shutdown had already been started by an earlier call
    AlreadyClosed,
}

/// Lifecycle of the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Consuming records and ticks
    Running,
    /// Shutdown received, performing the final flush
    Draining,
    /// Final flush done and completion signalled
    Terminated,
}

/// Atomic cell holding a [`WorkerState`]
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn get(&self) -> WorkerState {
        match self.0.load(Ordering::Acquire) {
            0 => WorkerState::Running,
            1 => WorkerState::Draining,
            _ => WorkerState::Terminated,
        }
    }
}

/// Item in the pending queue
pub(crate) enum Message {
    Record(BytesMut),
    Shutdown,
}

/// Handle to a running core
///
/// Cheap to clone; all clones share one queue, worker and sink. The core is
/// shut down by the first successful [`close`](Self::close), or when the
/// last handle is dropped.
#[derive(Clone)]
pub struct AsyncCore {
    inner: Arc<Inner>,
}

struct Inner {
    config: AsyncCoreConfig,
    sender: Sender<Message>,
    /// Receiver clone for records that land behind the shutdown sentinel;
    /// only read once the worker has terminated.
    backlog: Mutex<Receiver<Message>>,
    done: Receiver<()>,
    sink: Arc<dyn Sink>,
    pool: Arc<BufferPool>,
    metrics: Arc<CoreMetrics>,
    state: Arc<StateCell>,
    errors: Arc<RateLimitedLogger>,
    stopped: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl AsyncCore {
    /// Start a core writing to `sink`
    ///
    /// Spawns the worker thread; the only failure is the spawn itself.
    pub fn new(config: AsyncCoreConfig, sink: Arc<dyn Sink>) -> Result<Self, CoreError> {
        let (sender, receiver) = channel::bounded(config.queue_capacity.max(1));
        let (done_tx, done_rx) = channel::bounded(1);

        let pool = Arc::new(BufferPool::new(config.pool_size, config.record_capacity));
        let metrics = Arc::new(CoreMetrics::new());
        let state = Arc::new(StateCell::new(WorkerState::Running));
        let errors = Arc::new(RateLimitedLogger::default());

        let worker = Worker {
            receiver: receiver.clone(),
            sink: Arc::clone(&sink),
            pool: Arc::clone(&pool),
            metrics: Arc::clone(&metrics),
            state: Arc::clone(&state),
            errors: Arc::clone(&errors),
            done: done_tx,
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || worker.run())
            .map_err(CoreError::SpawnWorker)?;
        let worker_id = handle.thread().id();

        tracing::info!(
            queue_capacity = config.queue_capacity,
            batch_size = config.batch_size,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            shutdown_timeout_ms = config.shutdown_timeout.as_millis() as u64,
            "async log core started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sender,
                backlog: Mutex::new(receiver),
                done: done_rx,
                sink,
                pool,
                metrics,
                state,
                errors,
                stopped: AtomicBool::new(false),
                worker: Mutex::new(Some(handle)),
                worker_id,
            }),
        })
    }

    /// Submit one encoded record
    ///
    /// Never fails: sink errors are counted in [`metrics`](Self::metrics).
    /// Blocks only when the queue is full or the record is panic-class; in
    /// the latter case the record is on the sink and the core is shut down
    /// by the time this returns (unless the shutdown timed out).
    pub fn write(&self, record: BytesMut, level: Level) {
        let inner = &*self.inner;
        inner.metrics.record_received();

        // Diagnostics emitted by the worker itself may be routed back here;
        // queueing them would wait on the very thread that has to drain.
        if thread::current().id() == inner.worker_id {
            inner.write_direct(record);
            return;
        }

        if level.is_panic_class() {
            if inner.stopped.load(Ordering::Acquire) {
                inner.write_direct(record);
                inner.sync_sink();
            } else {
                inner.enqueue_blocking(Message::Record(record));
                inner.shutdown();
            }
            return;
        }

        if inner.stopped.load(Ordering::Acquire) {
            inner.write_direct(record);
            return;
        }

        match inner.sender.try_send(Message::Record(record)) {
            Ok(()) => inner.enqueued(),
            Err(TrySendError::Full(message)) => {
                inner.metrics.record_queue_full();
                inner.write_notice(QUEUE_BLOCKED_NOTICE);
                inner.enqueue_blocking(message);
            }
            Err(TrySendError::Disconnected(message)) => inner.write_message_direct(message),
        }
    }

    /// Shut the core down, waiting at most `shutdown_timeout`
    ///
    /// Only the first call performs the shutdown. Later (or concurrent)
    /// calls wait for the same completion, bounded by the same timeout, and
    /// report [`ShutdownOutcome::AlreadyClosed`].
    pub fn close(&self) -> ShutdownOutcome {
        self.inner.shutdown()
    }

    /// Sync the sink
    ///
    /// Does not flush the accumulator; records still batched by the worker
    /// are not covered.
    pub fn sync(&self) -> io::Result<()> {
        self.inner.sink.sync()
    }

    /// Take a record buffer from the pool
    ///
    /// Buffers passed to [`write`](Self::write) return to the pool once
    /// their bytes are on the sink or in the accumulator.
    pub fn buffer(&self) -> BytesMut {
        self.inner.pool.get()
    }

    /// True if a record at `level` would be kept by the tracing writer
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.inner.config.min_level
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        self.inner.state.get()
    }

    pub fn config(&self) -> &AsyncCoreConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &CoreMetrics {
        &self.inner.metrics
    }

    pub fn pool_metrics(&self) -> PoolSnapshot {
        self.inner.pool.metrics().snapshot()
    }
}

impl std::fmt::Debug for AsyncCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCore")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Inner {
    fn shutdown(&self) -> ShutdownOutcome {
        let deadline = Instant::now() + self.config.shutdown_timeout;

        if self.stopped.swap(true, Ordering::SeqCst) {
            if self.await_done(deadline) {
                self.drain_backlog();
            }
            return ShutdownOutcome::AlreadyClosed;
        }

        let handshake = match self.sender.send_deadline(Message::Shutdown, deadline) {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => self.await_done(deadline),
            Err(SendTimeoutError::Timeout(_)) => false,
        };

        if !handshake {
            self.metrics.record_shutdown_timeout();
            tracing::warn!(
                timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                state = ?self.state.get(),
                "log worker did not finish before the shutdown timeout, records may be lost"
            );
            self.report_timeout_detached();
            self.join_worker(false);
            return ShutdownOutcome::TimedOut;
        }

        self.drain_backlog();
        self.write_notice(FLUSH_COMPLETED_NOTICE);
        self.join_worker(true);
        self.sync_sink();
        tracing::debug!("async log core closed");
        ShutdownOutcome::Flushed
    }

    /// Write the timeout notice and sync from a detached thread
    ///
    /// The worker may still be inside the sink, and sinks serialize writes,
    /// so `close` must not wait on either call.
    fn report_timeout_detached(&self) {
        let sink = Arc::clone(&self.sink);
        let metrics = Arc::clone(&self.metrics);
        let errors = Arc::clone(&self.errors);

        let spawned = thread::Builder::new()
            .name(NOTICE_THREAD_NAME.into())
            .spawn(move || {
                write_counted(&*sink, FLUSH_TIMED_OUT_NOTICE, &metrics, &errors, "notice write");
                sync_counted(&*sink, &metrics, &errors);
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to spawn shutdown notice thread");
        }
    }

    /// Wait for the worker's done signal until `deadline`
    fn await_done(&self, deadline: Instant) -> bool {
        match self.done.recv_deadline(deadline) {
            Ok(()) => true,
            // Either an earlier waiter took the signal, or the worker died
            // without sending it
            Err(RecvTimeoutError::Disconnected) => self.state.get() == WorkerState::Terminated,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Join the worker thread, reporting a panic
    ///
    /// With `wait == false` only an already finished worker is joined.
    fn join_worker(&self, wait: bool) {
        let handle = self.worker.lock().take_if(|h| wait || h.is_finished());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::warn!(state = ?self.state.get(), "log worker panicked");
        }
    }

    /// Write records that were enqueued behind the shutdown sentinel
    ///
    /// No-op until the worker has terminated: before that, the queue still
    /// holds records (and the sentinel) that belong to the worker.
    fn drain_backlog(&self) {
        if self.state.get() != WorkerState::Terminated {
            return;
        }

        let receiver = self.backlog.lock();
        let mut pending = BytesMut::new();
        let mut records = 0u64;
        for message in receiver.try_iter() {
            if let Message::Record(record) = message {
                pending.extend_from_slice(&record);
                self.pool.put(record);
                records += 1;
            }
        }

        if records > 0 {
            self.metrics
                .direct_writes
                .fetch_add(records, Ordering::Relaxed);
            self.write_sink(&pending, "late record write");
        }
        drop(receiver);

        if records > 0 {
            tracing::debug!(records, "wrote records queued behind shutdown");
        }
    }

    /// Bookkeeping after a successful enqueue
    ///
    /// A record enqueued after shutdown started may sit behind the sentinel
    /// where the worker never looks; whoever enqueued it drains it once the
    /// worker is gone, and `close` drains whatever arrived before that.
    fn enqueued(&self) {
        self.metrics.record_enqueued();
        if self.stopped.load(Ordering::SeqCst) {
            self.drain_backlog();
        }
    }

    fn enqueue_blocking(&self, mut message: Message) {
        loop {
            match self.sender.send_timeout(message, BLOCKED_SEND_POLL) {
                Ok(()) => return self.enqueued(),
                Err(SendTimeoutError::Timeout(pending)) => {
                    // A worker that exited at the sentinel no longer frees slots
                    self.drain_backlog();
                    message = pending;
                }
                Err(SendTimeoutError::Disconnected(pending)) => {
                    return self.write_message_direct(pending);
                }
            }
        }
    }

    fn write_message_direct(&self, message: Message) {
        if let Message::Record(record) = message {
            self.write_direct(record);
        }
    }

    fn write_direct(&self, record: BytesMut) {
        self.metrics.record_direct();
        self.write_sink(&record, "direct write");
        self.pool.put(record);
    }

    fn write_notice(&self, notice: &[u8]) {
        self.write_sink(notice, "notice write");
    }

    fn write_sink(&self, bytes: &[u8], what: &str) {
        write_counted(&*self.sink, bytes, &self.metrics, &self.errors, what);
    }

    fn sync_sink(&self) {
        sync_counted(&*self.sink, &self.metrics, &self.errors);
    }
}

fn write_counted(
    sink: &dyn Sink,
    bytes: &[u8],
    metrics: &CoreMetrics,
    errors: &RateLimitedLogger,
    what: &str,
) {
    if let Err(e) = sink.write(bytes) {
        metrics.record_write_error();
        errors.error(what, &e);
    }
}

fn sync_counted(sink: &dyn Sink, metrics: &CoreMetrics, errors: &RateLimitedLogger) {
    if let Err(e) = sink.sync() {
        metrics.record_write_error();
        errors.error("sync", &e);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.stopped.load(Ordering::Acquire) {
            self.shutdown();
        } else {
            self.drain_backlog();
        }
    }
}
