//! `tracing` integration
//!
//! [`AsyncCore`] implements [`MakeWriter`], so any `fmt` layer can use it as
//! its output. The layer formats each event into one buffer and writes it
//! through a fresh [`RecordWriter`]; dropping the writer submits that buffer
//! as a single record at the event's level.
//!
//! ```no_run
//! use std::sync::Arc;
//! use spool_core::{AsyncCore, AsyncCoreConfig, WriterSink};
//! use tracing_subscriber::{fmt, prelude::*};
//!
//! let core = AsyncCore::new(AsyncCoreConfig::default(), Arc::new(WriterSink::stdout())).unwrap();
//! tracing_subscriber::registry()
//!     .with(fmt::layer().with_writer(core.clone()))
//!     .init();
//!
//! tracing::info!("batched");
//! core.close();
//! ```

use std::io;

use bytes::BytesMut;
use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;

use crate::async_core::AsyncCore;
use crate::level::Level;

/// Collects one formatted event and submits it on drop
///
/// A writer created for a level below the core's `min_level` discards
/// everything written to it.
pub struct RecordWriter<'a> {
    core: &'a AsyncCore,
    buf: Option<BytesMut>,
    level: Level,
}

impl<'a> RecordWriter<'a> {
    fn new(core: &'a AsyncCore, level: Level) -> Self {
        let buf = core.enabled(level).then(|| core.buffer());
        Self { core, buf, level }
    }
}

impl io::Write for RecordWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Some(buf) = self.buf.as_mut() {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordWriter<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take()
            && !buf.is_empty()
        {
            self.core.write(buf, self.level);
        }
    }
}

impl<'a> MakeWriter<'a> for AsyncCore {
    type Writer = RecordWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter::new(self, Level::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        RecordWriter::new(self, Level::from(*meta.level()))
    }
}
