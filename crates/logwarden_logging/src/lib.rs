//! Tracing setup shared by Logwarden binaries.
//!
//! Two layers: a non-blocking daily-rotated file under `~/.logwarden/logs`
//! and a human-readable stderr layer.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "logwarden=info,logwarden_ingest=info,logwarden_db=info";
const VERBOSE_LOG_FILTER: &str = "logwarden=debug,logwarden_ingest=debug,logwarden_db=debug";
const MAX_LOG_FILES: usize = 5;

/// Logging configuration for the ingestion daemon.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Raise the console filter to `debug`.
    pub verbose: bool,
    /// Override the log directory (defaults to `~/.logwarden/logs`).
    pub log_dir: Option<PathBuf>,
}

/// Install the global subscriber.
///
/// File output is buffered on a background thread; keep the returned guard
/// alive until exit or the tail of the log is lost.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir()?,
    };
    let appender = file_appender(&log_dir, config.app_name)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}

/// Daily files named `{app}.{date}.log`, oldest pruned past five.
fn file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Get the Logwarden home directory: ~/.logwarden
pub fn logwarden_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("LOGWARDEN_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".logwarden"))
        .ok_or_else(|| anyhow!("Could not determine home directory; set LOGWARDEN_HOME"))
}

/// Get the logs directory: ~/.logwarden/logs
pub fn logs_dir() -> Result<PathBuf> {
    Ok(logwarden_home()?.join("logs"))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("logwarden daemon/1"), "logwarden_daemon_1");
    }

    #[test]
    fn test_file_appender_writes_dated_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("logs");

        let mut appender = file_appender(&dir, "ingest").unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("ingest."));
        assert!(names[0].ends_with(".log"));
    }
}
