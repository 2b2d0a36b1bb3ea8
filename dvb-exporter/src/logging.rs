//! Logging system with file output and log rotation.
//!
//! Console and file output share one filter. Log files rotate daily and only
//! the last N days are kept. Without a usable log directory the exporter keeps
//! running with console output only.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use log::warn;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "dvb-exporter.log";

/// Initialize the logging system with console output and, when `log_dir` is
/// usable, a daily rolling log file.
///
/// A log directory that cannot be created or opened only disables the file
/// output; the failure is logged once the console output is up.
///
/// # Arguments
/// * `log_dir` - Directory where log files will be stored
/// * `retention_days` - Number of days to keep log files
/// * `verbose` - Whether to enable debug-level logging
/// * `level` - Filter directive used when neither `RUST_LOG` nor `verbose` is set
pub fn init_logging(
    log_dir: &Path,
    retention_days: u64,
    verbose: bool,
    level: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (file_writer, file_error) = match open_log_file(log_dir) {
        Ok(writer) => (Some(writer), None),
        Err(e) => (None, Some(e)),
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, level)));

    let console_layer = fmt::layer().with_writer(io::stdout).with_timer(LocalTimeTimer);
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(LocalTimeTimer)
    });

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer),
    )
    .map_err(|e| format!("Failed to set default subscriber: {}", e))?;

    // Bridge log:: macros to tracing
    tracing_log::LogTracer::init().map_err(|e| format!("Failed to initialize LogTracer: {}", e))?;

    match file_error {
        Some(e) => warn!(
            "File logging disabled, cannot use log directory {}: {}",
            log_dir.display(),
            e
        ),
        None => {
            if let Err(e) = clean_old_logs(log_dir, retention_days) {
                warn!("Failed to clean old logs in {}: {}", log_dir.display(), e);
            }
        }
    }

    Ok(())
}

/// Daily rolling writer under `log_dir`, creating the directory if needed.
fn open_log_file(log_dir: &Path) -> Result<NonBlocking, Box<dyn std::error::Error>> {
    fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // Flushes on drop; must live for the whole program.
    Box::leak(Box::new(guard));
    Ok(writer)
}

fn default_directive(verbose: bool, level: Option<&str>) -> &str {
    if verbose {
        "debug"
    } else {
        level.unwrap_or("info")
    }
}

/// Remove exporter log files older than `retention_days`.
fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.contains(LOG_FILE_NAME));
        if !is_log {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|metadata| metadata.modified()) else {
            continue;
        };
        let modified: chrono::DateTime<Local> = modified.into();
        if modified < cutoff {
            if let Err(e) = fs::remove_file(&path) {
                eprintln!("Failed to remove old log file {:?}: {}", path, e);
            }
        }
    }

    Ok(())
}

/// Custom timer for local time formatting in logs
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(true, Some("warn")), "debug");
        assert_eq!(default_directive(false, Some("warn")), "warn");
        assert_eq!(default_directive(false, None), "info");
    }

    #[test]
    fn test_clean_old_logs_only_removes_exporter_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old_log = dir.path().join(format!("{}.2024-01-01", LOG_FILE_NAME));
        let other = dir.path().join("other.txt");
        fs::write(&old_log, "old").unwrap();
        fs::write(&other, "keep").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        // Nothing is old enough with a week of retention.
        clean_old_logs(dir.path(), 7).unwrap();
        assert!(old_log.exists());

        clean_old_logs(dir.path(), 0).unwrap();
        assert!(!old_log.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_open_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        assert!(open_log_file(&log_dir).is_ok());
        assert!(log_dir.is_dir());

        assert!(open_log_file(Path::new("/dev/null/logs")).is_err());
    }

    // The only test installing the global subscriber.
    #[test]
    fn test_unusable_log_dir_keeps_console_logging() {
        assert!(init_logging(Path::new("/dev/null/logs"), 7, false, None).is_ok());
    }

    #[test]
    fn test_clean_old_logs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(clean_old_logs(&dir.path().join("missing"), 7).is_ok());
    }
}
