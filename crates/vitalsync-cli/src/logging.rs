//! Stdout + log file output, both filtered by `RUST_LOG` or the configured level.

use std::fs;
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use vitalsync_core::config::LoggingConfig;

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(cfg: &LoggingConfig) -> io::Result<WorkerGuard> {
    fs::create_dir_all(&cfg.dir)?;
    let appender = if cfg.rotation {
        tracing_appender::rolling::daily(&cfg.dir, &cfg.file)
    } else {
        tracing_appender::rolling::never(&cfg.dir, &cfg.file)
    };
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stdout)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(filter()),
        )
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}
