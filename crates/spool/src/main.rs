//! spool - pipe lines from stdin through the async log core
//!
//! # Usage
//!
//! ```bash
//! # Batch an application's output into a rotating file
//! my-service | spool --output logs/app.log
//!
//! # Settings from a config file, records tagged as warnings
//! my-service | spool --config configs/spool.toml --level warn
//! ```
//!
//! Each input line becomes one record. Without `--output` or a `[file]`
//! section the records go to stdout; spool's own diagnostics always go to
//! stderr.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use spool_config::{Config, LogConfig, LogFormat};
use spool_core::{
    AsyncCore, AsyncCoreConfig, FileSink, FileSinkConfig, Level, ShutdownOutcome, Sink,
    WriterSink,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// spool - asynchronous batching log writer
#[derive(Parser, Debug)]
#[command(name = "spool")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file to write to (overrides [file].path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Severity attached to every record (debug .. fatal)
    #[arg(long, default_value = "info")]
    level: Level,

    /// Diagnostics level of spool itself (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(&config.log, cli.log_level.as_deref())?;

    let sink = open_sink(&cli, &config)?;
    let core = AsyncCore::new(AsyncCoreConfig::from(&config.core), sink)?;

    let stdin = io::stdin();
    let lines = pump(&core, cli.level, stdin.lock()).context("failed to read stdin")?;

    let outcome = core.close();
    let metrics = core.metrics().snapshot();
    tracing::info!(
        lines,
        ?outcome,
        flushes = metrics.flushes,
        bytes_flushed = metrics.bytes_flushed,
        direct_writes = metrics.direct_writes,
        queue_full = metrics.queue_full,
        write_errors = metrics.write_errors,
        "spool finished"
    );

    if outcome == ShutdownOutcome::TimedOut {
        anyhow::bail!("log flush timed out, records may be lost");
    }
    Ok(())
}

/// Initialize the tracing subscriber for spool's own diagnostics
///
/// The CLI flag wins over the config file.
fn init_logging(log: &LogConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(log.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match log.format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(io::stderr))
            .with(filter)
            .init(),
    }

    Ok(())
}

/// File sink when a path is configured, stdout otherwise
fn open_sink(cli: &Cli, config: &Config) -> Result<Arc<dyn Sink>> {
    let file_config = match (&cli.output, &config.file) {
        (Some(path), Some(file)) => Some(FileSinkConfig::from(file).with_path(path)),
        (Some(path), None) => Some(FileSinkConfig::new(path)),
        (None, Some(file)) => Some(FileSinkConfig::from(file)),
        (None, None) => None,
    };

    match file_config {
        Some(file_config) => {
            let sink = FileSink::open(file_config).context("failed to open log file")?;
            tracing::info!(path = %sink.path().display(), "writing records to file");
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(WriterSink::stdout())),
    }
}

/// Submit every input line as one newline-terminated record
fn pump(core: &AsyncCore, level: Level, mut input: impl BufRead) -> io::Result<u64> {
    let mut line = Vec::new();
    let mut lines = 0;

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        let mut record = core.buffer();
        record.extend_from_slice(&line);
        if !line.ends_with(b"\n") {
            record.extend_from_slice(b"\n");
        }
        core.write(record, level);
        lines += 1;
    }

    Ok(lines)
}
