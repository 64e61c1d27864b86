//! Logging setup.
//!
//! Initializes a `tracing-subscriber` registry with a console layer and a
//! daily-rotating file layer (via `tracing-appender`), using local-time
//! timestamps. The filter directive is derived from `logger_level` (spec
//! §6.3) with per-crate overrides for noisy dependencies.

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Timer that formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Build the default filter directive from the configured logger level.
fn filter_directive(logger_level: &str) -> String {
    format!("twitch_recorder={logger_level},sqlx=warn")
}

/// Initialize logging. Returns a [`WorkerGuard`] that must be kept alive for
/// the process lifetime — dropping it stops the non-blocking file writer.
pub fn init_logging(log_dir: impl AsRef<Path>, logger_level: &str) -> crate::error::Result<WorkerGuard> {
    let log_path = PathBuf::from(log_dir.as_ref());
    std::fs::create_dir_all(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, "twitch-recorder.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(logger_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| crate::error::Error::Other(format!("failed to install log subscriber: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directive_includes_level_and_sqlx_override() {
        let directive = filter_directive("debug");
        assert!(directive.contains("twitch_recorder=debug"));
        assert!(directive.contains("sqlx=warn"));
    }
}
