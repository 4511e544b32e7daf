//! Tracing setup for the CLI.
//!
//! Console output goes to stderr (compact or JSON). When a log directory is
//! available, everything the filter admits is also appended to
//! `bidforge.log` through a non-blocking writer; keep the returned guard
//! alive until exit so buffered lines are flushed.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE: &str = "bidforge.log";

/// `RUST_LOG` when set, otherwise `bidforge=info` (`debug` when verbose).
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("bidforge=debug,warn")
            } else {
                EnvFilter::try_new("bidforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_tracing(verbose: bool, json: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Info lines would fight the progress bars; the console only shows them when verbose.
    let console_level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_level)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_level)
            .boxed()
    };

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(env_filter(verbose))
        .try_init()
        .context("Failed to initialise tracing")?;

    Ok(guard)
}
