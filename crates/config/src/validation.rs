//! Configuration validation
//!
//! Rejects settings the core cannot run with:
//! - Zero-sized queue, batch threshold, or record pool
//! - Zero flush interval or shutdown timeout
//! - File sink without a path or with a zero rotation size

use std::time::Duration;

use crate::Config;
use crate::async_core::CoreConfig;
use crate::error::{ConfigError, Result};
use crate::file::FileConfig;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_core(&config.core)?;
    if let Some(ref file) = config.file {
        validate_file(file)?;
    }
    Ok(())
}

fn validate_core(core: &CoreConfig) -> Result<()> {
    let positive = [
        ("queue_capacity", core.queue_capacity),
        ("batch_size", core.batch_size),
        ("pool_size", core.pool_size),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::invalid_value("core", "core", field, "must be > 0"));
        }
    }

    let durations = [
        ("flush_interval", core.flush_interval),
        ("shutdown_timeout", core.shutdown_timeout),
    ];
    for (field, value) in durations {
        if value == Duration::ZERO {
            return Err(ConfigError::invalid_value(
                "core",
                "core",
                field,
                "must be a non-zero duration",
            ));
        }
    }

    Ok(())
}

fn validate_file(file: &FileConfig) -> Result<()> {
    if file.path.trim().is_empty() {
        return Err(ConfigError::invalid_value("file", "file", "path", "is required"));
    }
    if file.max_size_mb == 0 {
        return Err(ConfigError::invalid_value(
            "file",
            file.path.clone(),
            "max_size_mb",
            "must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let err = Config::from_str("[core]\nqueue_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = Config::from_str("[core]\nbatch_size = 0").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let err = Config::from_str("[core]\nflush_interval = \"0s\"").unwrap_err();
        assert!(err.to_string().contains("flush_interval"));
    }

    #[test]
    fn test_zero_shutdown_timeout_rejected() {
        let err = Config::from_str("[core]\nshutdown_timeout = \"0ms\"").unwrap_err();
        assert!(err.to_string().contains("shutdown_timeout"));
    }

    #[test]
    fn test_file_without_path_rejected() {
        let err = Config::from_str("[file]\nmax_backups = 3").unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_file_zero_size_rejected() {
        let err = Config::from_str("[file]\npath = \"a.log\"\nmax_size_mb = 0").unwrap_err();
        assert!(err.to_string().contains("max_size_mb"));
    }
}
