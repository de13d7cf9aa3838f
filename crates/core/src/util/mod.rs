//! Supporting pieces for the async core
//!
//! - **buffer_pool**: recycled record buffers, so producers rarely allocate
//! - **rate_limited_logger**: sink-failure diagnostics that cannot flood

pub mod buffer_pool;
pub mod rate_limited_logger;

pub use buffer_pool::{BufferPool, BufferPoolMetrics, PoolSnapshot};
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
