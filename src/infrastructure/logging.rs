//! File-based logging
//!
//! Writes logs to the configured directory, separated by type:
//! - <dir>/main - general application logs
//! - <dir>/trades - opportunity and trade records for offline analysis

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize console + file logging.
///
/// Returns WorkerGuards which must be kept alive for the duration of the
/// program, or buffered log lines are lost on exit.
pub fn init_logging(config: &LoggingConfig) -> crate::Result<Vec<WorkerGuard>> {
    let logs_dir = Path::new(&config.dir);
    fs::create_dir_all(logs_dir.join("main"))?;
    fs::create_dir_all(logs_dir.join("trades"))?;

    let mut guards = Vec::new();

    let (main_appender, main_guard) = create_appender(&logs_dir.join("main"), "main");
    guards.push(main_guard);

    let (trade_appender, trade_guard) = create_appender(&logs_dir.join("trades"), "trades");
    guards.push(trade_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .json();

    // Trade log only carries detector/executor records
    let trade_layer = tracing_subscriber::fmt::layer()
        .with_writer(trade_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("executor") || metadata.target().contains("detector")
        }));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(trade_layer)
        .with(console_layer)
        .init();

    tracing::info!(dir = %config.dir, "logging initialized");
    Ok(guards)
}

/// Create a non-blocking daily-rolling file appender
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
    tracing_appender::non_blocking(appender)
}
