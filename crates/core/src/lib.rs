//! Spool Core - asynchronous batching log writes
//!
//! Decouples producers of log records from a slow byte sink. Records are
//! queued, accumulated into large batches by a single worker thread, and
//! written to the sink in one call per batch.
//!
//! # Modules
//!
//! - [`async_core`] - the queue, the worker, backpressure and shutdown
//! - [`sink`] - byte destinations (rotating file, any `io::Write`)
//! - [`writer`] - `tracing_subscriber` integration
//! - [`level`] - record severities
//! - [`util`] - buffer pool and rate-limited diagnostics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use spool_core::{AsyncCore, AsyncCoreConfig, FileSink, FileSinkConfig, Level};
//!
//! let sink = FileSink::open(FileSinkConfig::new("logs/app.log")).unwrap();
//! let core = AsyncCore::new(AsyncCoreConfig::default(), Arc::new(sink)).unwrap();
//!
//! let mut record = core.buffer();
//! record.extend_from_slice(b"service started\n");
//! core.write(record, Level::Info);
//!
//! core.close();
//! ```

pub mod async_core;
pub mod error;
pub mod level;
pub mod sink;
pub mod util;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use async_core::{
    AsyncCore, AsyncCoreConfig, CoreMetrics, CoreMetricsSnapshot, ShutdownOutcome, WorkerState,
};
pub use error::{CoreError, ParseLevelError, SinkError};
pub use level::Level;
pub use sink::{FileSink, FileSinkConfig, Sink, WriterSink};
pub use writer::RecordWriter;
