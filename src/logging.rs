//! Tracing setup: journald when available on Linux, a daily-rolling
//! log file otherwise. User-facing output stays on stdout untouched.

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. The `PICTOR_LOG` environment variable
/// selects the level filter; `info` when unset.
///
/// Returns the appender guard when logging to a file. The caller keeps
/// it alive so buffered lines flush on exit.
pub fn init(log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_env("PICTOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald)
                .init();
            tracing::info!("logging to journald");
            return Ok(None);
        }
    }

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "pictor.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    tracing::info!(dir = %log_dir.display(), "logging to file");
    Ok(Some(guard))
}
