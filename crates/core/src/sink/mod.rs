//! Destinations for log bytes
//!
//! A [`Sink`] receives raw bytes that are already fully encoded. The core
//! writes to it from its worker thread for batched flushes, and from
//! producer threads for the direct paths (post-shutdown records, the
//! queue-blocked notice, shutdown notices). Implementations must therefore
//! be safe for concurrent writers, which is why every method takes `&self`.
//!
//! | Sink | Destination |
//! |------|-------------|
//! | [`FileSink`] | Append-only file with size-based rotation |
//! | [`WriterSink`] | Any `io::Write` (stdout, stderr, a `Vec<u8>`) behind a mutex |

pub mod file;

use std::io::{self, Write};

use parking_lot::Mutex;

pub use file::{FileSink, FileSinkConfig};

/// Byte destination shared by the worker and producer threads
pub trait Sink: Send + Sync {
    /// Write the whole buffer, returning the number of bytes written
    ///
    /// Implementations either consume all of `buf` or fail; the core does
    /// not retry short writes.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Push buffered bytes to durable storage
    fn sync(&self) -> io::Result<()>;
}

/// Adapts any `io::Write` into a [`Sink`] by serializing access with a mutex
pub struct WriterSink<W> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the wrapped writer
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl WriterSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_sink_appends() {
        let sink = WriterSink::new(Vec::new());
        assert_eq!(sink.write(b"one\n").unwrap(), 4);
        assert_eq!(sink.write(b"two\n").unwrap(), 4);
        sink.sync().unwrap();

        assert_eq!(sink.into_inner(), b"one\ntwo\n");
    }

    #[test]
    fn test_writer_sink_is_object_safe() {
        let sink: Box<dyn Sink> = Box::new(WriterSink::new(Vec::new()));
        assert_eq!(sink.write(b"").unwrap(), 0);
    }
}
