//! Background worker: drains the pending queue into batched sink writes
//!
//! ```text
//!            ┌──────── record ────────┐
//! [queue] ──►│ append to accumulator  │── len >= batch_size ──┐
//!            └────────────────────────┘                       ▼
//! [ticker] ─────────── tick ─────────────────────────► flush (one sink write)
//!            ┌──────── shutdown ──────┐
//! [queue] ──►│ final flush, signal done, exit
//!            └────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use crossbeam::channel::{self, Receiver, Sender};

use super::metrics::CoreMetrics;
use super::{Message, StateCell, WorkerState};
use crate::sink::Sink;
use crate::util::{BufferPool, RateLimitedLogger};

/// Name of the worker thread
pub(crate) const WORKER_THREAD_NAME: &str = "spool-worker";

/// A zero interval would spin the ticker
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

pub(super) struct Worker {
    pub(super) receiver: Receiver<Message>,
    pub(super) sink: Arc<dyn Sink>,
    pub(super) pool: Arc<BufferPool>,
    pub(super) metrics: Arc<CoreMetrics>,
    pub(super) state: Arc<StateCell>,
    pub(super) errors: Arc<RateLimitedLogger>,
    pub(super) done: Sender<()>,
    pub(super) batch_size: usize,
    pub(super) flush_interval: Duration,
}

impl Worker {
    pub(super) fn run(self) {
        let ticker = channel::tick(self.flush_interval.max(MIN_FLUSH_INTERVAL));
        let mut batch = Batch::with_capacity(self.batch_size);
        let mut flush_pending = false;

        loop {
            crossbeam::select! {
                recv(self.receiver) -> message => match message {
                    Ok(Message::Record(record)) => {
                        batch.push(&record);
                        self.pool.put(record);
                        if batch.bytes.len() >= self.batch_size {
                            flush_pending = true;
                        }
                    }
                    // Every sender gone counts as a shutdown request
                    Ok(Message::Shutdown) | Err(_) => break,
                },
                recv(ticker) -> _ => flush_pending = true,
            }

            if flush_pending {
                self.flush(&mut batch);
                flush_pending = false;
            }
        }

        self.state.set(WorkerState::Draining);
        self.flush(&mut batch);
        drop(ticker);

        self.state.set(WorkerState::Terminated);
        let _ = self.done.send(());
        tracing::debug!("log worker terminated");
    }

    /// Write the whole accumulator in one sink call and reset it
    ///
    /// A failed write is counted and logged; its bytes are not retried.
    fn flush(&self, batch: &mut Batch) {
        if batch.bytes.is_empty() {
            return;
        }

        match self.sink.write(&batch.bytes) {
            Ok(written) => self.metrics.record_flush(batch.records, written as u64),
            Err(e) => {
                self.metrics.record_write_error();
                self.errors.error("batched flush", &e);
            }
        }
        batch.clear();
    }
}

/// Accumulated bytes plus the number of records they came from
struct Batch {
    bytes: BytesMut,
    records: u64,
}

impl Batch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            records: 0,
        }
    }

    fn push(&mut self, record: &[u8]) {
        self.bytes.extend_from_slice(record);
        self.records += 1;
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.records = 0;
    }
}
