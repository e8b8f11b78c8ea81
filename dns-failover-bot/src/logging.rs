//! Tracing setup.
//!
//! Library crates log through `log`; `try_init` installs the `tracing-log`
//! bridge so those records land in the same subscriber.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::LoggerConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init(config: &LoggerConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(if config.development {
        fmt::layer().with_ansi(true).with_target(true).boxed()
    } else {
        fmt::layer().json().with_ansi(false).boxed()
    });

    let mut guard = None;
    if let Some(path) = &config.file_path {
        let (dir, prefix, suffix) = file_parts(path);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .filename_suffix(suffix)
            .max_log_files(config.keep_days.max(1))
            .build(&dir)
            .context("Failed to open log file")?;
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        level = %config.level,
        development = config.development,
        file = ?config.file_path,
        "Logger initialized"
    );
    Ok(guard)
}

/// `logs/app.log` -> (`logs`, `app`, `log`); rotated files become
/// `app.2025-10-16.log`.
fn file_parts(path: &Path) -> (PathBuf, String, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("logs"), Path::to_path_buf);
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("app")
        .to_string();
    let suffix = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("log")
        .to_string();
    (dir, prefix, suffix)
}
