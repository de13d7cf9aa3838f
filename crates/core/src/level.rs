//! Record severity
//!
//! The ladder mirrors the usual structured-logger levels. Anything above
//! `Error` is panic-class: the core flushes such a record synchronously and
//! shuts itself down, since the process is expected to exit right after.

use std::fmt;
use std::str::FromStr;

use spool_config::RecordLevel;

use crate::error::ParseLevelError;

/// Severity attached to each record handed to the core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Development panic: panics in debug builds of the producer only
    DPanic,
    Panic,
    Fatal,
}

impl Level {
    /// True for severities above `Error`
    #[inline]
    pub fn is_panic_class(self) -> bool {
        self > Level::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::DPanic => "dpanic",
            Self::Panic => "panic",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "dpanic" => Ok(Self::DPanic),
            "panic" => Ok(Self::Panic),
            "fatal" => Ok(Self::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            // tracing has no level below debug on our ladder
            _ => Level::Debug,
        }
    }
}

impl From<RecordLevel> for Level {
    fn from(level: RecordLevel) -> Self {
        match level {
            RecordLevel::Debug => Level::Debug,
            RecordLevel::Info => Level::Info,
            RecordLevel::Warn => Level::Warn,
            RecordLevel::Error => Level::Error,
            RecordLevel::DPanic => Level::DPanic,
            RecordLevel::Panic => Level::Panic,
            RecordLevel::Fatal => Level::Fatal,
        }
    }
}
