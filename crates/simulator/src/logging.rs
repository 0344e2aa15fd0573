//! Tracing subscriber setup for the binary.

use anyhow::Context;
use std::fs::File;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// Console output honours `RUST_LOG`, falling back to `info` (or `debug`
/// when `debug` is set). With `events_log`, every event at the same level is
/// also written to that file without ANSI colours. The returned guard must
/// be held until exit so buffered file output is flushed.
///
/// Fails if the events log cannot be created or a global subscriber is
/// already installed.
pub fn init(debug: bool, events_log: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let console = fmt::layer().with_target(false).with_filter(console_filter);

    let (file_layer, guard) = match events_log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to open events log {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer)
                .with_filter(default_level);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .context("failed to install the tracing subscriber")?;
    Ok(guard)
}
