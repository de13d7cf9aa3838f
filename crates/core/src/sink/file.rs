//! Append-only file sink with size-based rotation
//!
//! The async core already batches records into large writes, so the file is
//! written unbuffered: one `write_all` per flush.
//!
//! # Rotation
//!
//! When a write would push the active file past `max_size`, the file is
//! renamed to a timestamped backup next to it and a fresh file is opened:
//!
//! ```text
//! logs/
//! ├── app.log                          # active
//! ├── app-2025-01-15T10-30-45.123.log  # rotated backups
//! └── app-2025-01-15T09-12-03.456.log
//! ```
//!
//! Two rotations within the same millisecond get a `-1`, `-2`, ... suffix
//! after the timestamp. After each rotation, backups beyond `max_backups`
//! (oldest first) and backups older than `max_age` are removed. Only files
//! whose name carries a parseable backup timestamp are ever considered.

use std::ffi::OsString;
use std::fs::{self, DirBuilder, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use spool_config::FileConfig;

use super::Sink;
use crate::error::SinkError;

/// Default rotation threshold (100 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Backup timestamp, filesystem-safe and lexically sortable
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Length of a formatted backup timestamp (`2025-01-15T10-30-45.123`)
const BACKUP_TIME_LEN: usize = 23;

/// Configuration for [`FileSink`]
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Active log file
    pub path: PathBuf,

    /// Size in bytes that triggers rotation
    pub max_size: u64,

    /// Backups to keep; 0 keeps all
    pub max_backups: usize,

    /// Remove backups older than this; `None` keeps them regardless of age
    pub max_age: Option<Duration>,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/spool.log"),
            max_size: DEFAULT_MAX_SIZE,
            max_backups: 0,
            max_age: None,
        }
    }
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

impl From<&FileConfig> for FileSinkConfig {
    fn from(config: &FileConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            max_size: config.max_size_bytes(),
            max_backups: config.max_backups,
            max_age: config.max_age(),
        }
    }
}

struct ActiveFile {
    file: File,
    size: u64,
    /// Timestamp and sequence of the most recent backup name
    last_backup: Option<(String, u32)>,
}

/// What a rotation did, reported once the file lock is released
///
/// Diagnostics may be routed back into this very sink, so nothing is
/// logged while `active` is held.
struct Rotation {
    backup: PathBuf,
    removed: Vec<PathBuf>,
    prune_error: Option<io::Error>,
}

impl Rotation {
    fn report(self, path: &Path) {
        tracing::info!(
            path = %path.display(),
            backup = %self.backup.display(),
            "log file rotated"
        );
        for old in &self.removed {
            tracing::debug!(path = %old.display(), "removed old log backup");
        }
        if let Some(e) = self.prune_error {
            tracing::warn!(path = %path.display(), error = %e, "failed to prune log backups");
        }
    }
}

/// A rotated file next to the active one
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Backup {
    stamp: NaiveDateTime,
    seq: u32,
    path: PathBuf,
}

/// File sink with rotation
pub struct FileSink {
    config: FileSinkConfig,
    active: Mutex<ActiveFile>,
}

impl FileSink {
    /// Open (or create) the log file, creating missing parent directories
    ///
    /// Directories are created with mode 0755 on Unix so that other users
    /// can still reach the files inside.
    pub fn open(config: FileSinkConfig) -> Result<Self, SinkError> {
        if let Some(dir) = config.path.parent()
            && !dir.as_os_str().is_empty()
        {
            create_log_dir(dir).map_err(|source| SinkError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let active = open_active(&config.path).map_err(|source| SinkError::Open {
            path: config.path.clone(),
            source,
        })?;
        tracing::debug!(
            path = %config.path.display(),
            size = active.size,
            "opened log file"
        );

        Ok(Self {
            config,
            active: Mutex::new(active),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Bytes in the active file
    pub fn size(&self) -> u64 {
        self.active.lock().size
    }

    /// Move the active file aside and reopen; caller holds the file lock
    fn rotate(&self, active: &mut ActiveFile) -> io::Result<Rotation> {
        active.file.flush()?;

        let backup = self.backup_path(&mut active.last_backup);
        fs::rename(&self.config.path, &backup)?;

        let reopened = open_active(&self.config.path)?;
        active.file = reopened.file;
        active.size = reopened.size;

        let (removed, prune_error) = match self.prune_backups() {
            Ok(removed) => (removed, None),
            Err(e) => (Vec::new(), Some(e)),
        };
        Ok(Rotation {
            backup,
            removed,
            prune_error,
        })
    }

    /// Timestamped backup name, suffixed with a counter within one millisecond
    ///
    /// The counter keeps increasing for a repeated timestamp even when an
    /// earlier name was pruned, so names always sort in rotation order.
    fn backup_path(&self, last: &mut Option<(String, u32)>) -> PathBuf {
        let (stem, ext) = split_name(&self.config.path);
        let stamp = Local::now().format(BACKUP_TIME_FORMAT).to_string();

        let mut seq = match last {
            Some((prev, seq)) if *prev == stamp => *seq + 1,
            _ => 0,
        };
        loop {
            let mut name = if seq == 0 {
                OsString::from(format!("{}-{}", stem, stamp))
            } else {
                OsString::from(format!("{}-{}-{}", stem, stamp, seq))
            };
            if let Some(ext) = &ext {
                name.push(".");
                name.push(ext);
            }
            let candidate = self.config.path.with_file_name(name);
            if !candidate.exists() {
                *last = Some((stamp, seq));
                return candidate;
            }
            seq += 1;
        }
    }

    /// Backups of this file, oldest first
    fn list_backups(&self) -> io::Result<Vec<Backup>> {
        let dir = match self.config.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let (stem, ext) = split_name(&self.config.path);
        let prefix = format!("{}-", stem);
        let suffix = ext.map(|e| format!(".{}", e)).unwrap_or_default();

        let mut backups: Vec<Backup> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?;
                let middle = name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
                let (stamp, seq) = parse_backup_stamp(middle)?;
                Some(Backup { stamp, seq, path })
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// Remove backups beyond `max_backups` and older than `max_age`
    fn prune_backups(&self) -> io::Result<Vec<PathBuf>> {
        if self.config.max_backups == 0 && self.config.max_age.is_none() {
            return Ok(Vec::new());
        }

        let backups = self.list_backups()?;
        let excess = match self.config.max_backups {
            0 => 0,
            keep => backups.len().saturating_sub(keep),
        };
        let cutoff = self
            .config
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .map(|age| Local::now().naive_local() - age);

        let mut removed = Vec::new();
        for (i, backup) in backups.into_iter().enumerate() {
            let expired = cutoff.is_some_and(|cutoff| backup.stamp < cutoff);
            if i < excess || expired {
                fs::remove_file(&backup.path)?;
                removed.push(backup.path);
            }
        }
        Ok(removed)
    }
}

impl Sink for FileSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let rotation = {
            let mut active = self.active.lock();

            let incoming = buf.len() as u64;
            let rotation =
                if active.size > 0 && active.size.saturating_add(incoming) > self.config.max_size {
                    Some(self.rotate(&mut active)?)
                } else {
                    None
                };

            active.file.write_all(buf)?;
            active.size += incoming;
            rotation
        };

        if let Some(rotation) = rotation {
            rotation.report(&self.config.path);
        }
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.active.lock().file.sync_data()
    }
}

fn open_active(path: &Path) -> io::Result<ActiveFile> {
    let file = File::options().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok(ActiveFile {
        file,
        size,
        last_backup: None,
    })
}

fn create_log_dir(dir: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

/// Split `app.log` into (`app`, Some(`log`))
fn split_name(path: &Path) -> (String, Option<String>) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    (stem, ext)
}

/// Parse `2025-01-15T10-30-45.123` or `2025-01-15T10-30-45.123-2`
fn parse_backup_stamp(middle: &str) -> Option<(NaiveDateTime, u32)> {
    let stamp = middle.get(..BACKUP_TIME_LEN)?;
    let stamp = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()?;
    let seq = match &middle[BACKUP_TIME_LEN..] {
        "" => 0,
        rest => rest
            .strip_prefix('-')
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))?
            .parse()
            .ok()?,
    };
    Some((stamp, seq))
}

#[cfg(test)]
#[path = "file_test.rs"]
mod file_test;
