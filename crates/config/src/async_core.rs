//! Async core configuration
//!
//! Queue, batching, and shutdown settings for the log-write core.

use std::time::Duration;

use serde::Deserialize;

/// Record severity as written in configuration files
///
/// Mirrors the core's severity ladder; everything above `error` is
/// treated as panic-class by the core.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RecordLevel {
    #[default]
    Debug,
    Info,
    Warn,
    Error,
    DPanic,
    Panic,
    Fatal,
}

/// Async core configuration
///
/// # Example
///
/// ```toml
/// [core]
/// queue_capacity = 10240
/// batch_size = 102400
/// flush_interval = "1s"
/// shutdown_timeout = "2s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Pending queue capacity in records
    /// Default: 10240
    pub queue_capacity: usize,

    /// Accumulator size that forces a flush, in bytes
    /// Default: 100 KiB
    pub batch_size: usize,

    /// Timer interval that forces a flush
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Maximum wait for the worker's final flush on close
    /// Default: 2s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Number of pooled record buffers
    /// Default: 1024
    pub pool_size: usize,

    /// Bytes pre-allocated per pooled record buffer
    /// Default: 512
    pub record_capacity: usize,

    /// Minimum severity accepted by the tracing writer glue
    /// Default: debug
    pub min_level: RecordLevel,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10240,
            batch_size: 100 * 1024,
            flush_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(2),
            pool_size: 1024,
            record_capacity: 512,
            min_level: RecordLevel::Debug,
        }
    }
}
