//! Error types for building the core and its sinks
//!
//! Nothing here is returned from the write path: once a core is running,
//! sink failures are counted and logged, never handed back to producers.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to open or prepare a sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create the log directory
    #[error("failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the log file
    #[error("failed to open log file: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to start an async core
#[derive(Debug, Error)]
pub enum CoreError {
    /// The background worker thread could not be spawned
    #[error("failed to spawn log worker thread: {0}")]
    SpawnWorker(#[source] std::io::Error),

    /// Sink setup failed
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Unrecognized severity name
#[derive(Debug, Error)]
#[error("unknown level: {0} (expected debug, info, warn, error, dpanic, panic or fatal)")]
pub struct ParseLevelError(pub String);
