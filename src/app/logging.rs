//! Usage: Process-wide tracing setup (console + optional daily-rolling file).

use crate::infra::settings::LoggingSettings;
use crate::shared::error::AppResult;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init(settings: &LoggingSettings) -> AppResult<Option<WorkerGuard>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = filter_directives(rust_log.as_deref(), &settings.level);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(build_filter(directives)?);

    let Some(file) = settings.file.as_deref() else {
        tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .map_err(|e| format!("SYSTEM_ERROR: logging init failed: {e}"))?;
        return Ok(None);
    };

    let appender = build_file_appender(file, settings.retention_days)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(build_filter(directives)?);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| format!("SYSTEM_ERROR: logging init failed: {e}"))?;

    tracing::debug!(path = %file.display(), "file logging enabled");
    Ok(Some(guard))
}

fn filter_directives<'a>(env_value: Option<&'a str>, configured: &'a str) -> &'a str {
    env_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(configured)
}

fn build_filter(directives: &str) -> AppResult<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid log filter `{directives}`: {e}").into())
}

fn build_file_appender(file: &Path, retention_days: u32) -> AppResult<RollingFileAppender> {
    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = file
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| format!("SEC_INVALID_INPUT: invalid log file path: {}", file.display()))?;

    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(retention_days.max(1) as usize)
        .build(dir)
        .map_err(|e| format!("SYSTEM_ERROR: log file init failed: {e}").into())
}
