//! Spool Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use spool_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[file]\npath = \"logs/app.log\"").unwrap();
//! assert_eq!(config.core.queue_capacity, 10240);
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [core]
//! queue_capacity = 10240
//! batch_size = 102400
//! flush_interval = "1s"
//! shutdown_timeout = "2s"
//!
//! [file]
//! path = "logs/app.log"
//! max_size_mb = 100
//! max_backups = 7
//! ```

mod async_core;
mod error;
mod file;
mod logging;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use async_core::{CoreConfig, RecordLevel};
pub use error::{ConfigError, Result};
pub use file::FileConfig;
pub use logging::{LogConfig, LogFormat, LogLevel};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagnostics of spool itself
    pub log: LogConfig,

    /// Async core settings
    pub core: CoreConfig,

    /// File sink; when absent records go to stdout
    pub file: Option<FileConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.core.queue_capacity, 10240);
        assert_eq!(config.core.batch_size, 100 * 1024);
        assert_eq!(config.log.level, LogLevel::Info);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[core]
queue_capacity = 4
batch_size = 1000
flush_interval = "500ms"
shutdown_timeout = "3s"
min_level = "warn"

[file]
path = "logs/app.log"
max_size_mb = 10
max_backups = 3
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.core.queue_capacity, 4);
        assert_eq!(config.core.flush_interval, Duration::from_millis(500));
        assert_eq!(config.core.min_level, RecordLevel::Warn);

        let file = config.file.unwrap();
        assert_eq!(file.path, "logs/app.log");
        assert_eq!(file.max_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(file.max_backups, 3);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_str("[core\nqueue_capacity = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "[core]\nbatch_size = 2048").unwrap();

        let config = Config::from_file(tmp.path()).unwrap();
        assert_eq!(config.core.batch_size, 2048);
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file("/nonexistent/spool.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }
}
