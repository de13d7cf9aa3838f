//! File sink configuration

use std::time::Duration;

use serde::Deserialize;

/// Rotating file sink settings
///
/// # Example
///
/// ```toml
/// [file]
/// path = "logs/app.log"
/// max_size_mb = 100
/// max_backups = 7
/// max_age_days = 30
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Log file path; parent directories are created on open
    /// Required
    pub path: String,

    /// Rotate once the file would grow past this many megabytes
    /// Default: 100
    pub max_size_mb: u64,

    /// Rotated files to keep (0 keeps all)
    /// Default: 0
    pub max_backups: usize,

    /// Rotated files older than this many days are removed (0 keeps all)
    /// Default: 0
    pub max_age_days: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_size_mb: 100,
            max_backups: 0,
            max_age_days: 0,
        }
    }
}

impl FileConfig {
    /// Rotation threshold in bytes
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// Backup retention age, `None` when unlimited
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_days > 0).then(|| Duration::from_secs(self.max_age_days * 24 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_everything() {
        let config = FileConfig::default();
        assert_eq!(config.max_backups, 0);
        assert_eq!(config.max_age(), None);
    }

    #[test]
    fn test_max_age_in_days() {
        let config: FileConfig = toml::from_str("path = \"a.log\"\nmax_age_days = 2").unwrap();
        assert_eq!(config.max_age(), Some(Duration::from_secs(2 * 86_400)));
        assert_eq!(config.max_size_bytes(), 100 * 1024 * 1024);
    }
}
