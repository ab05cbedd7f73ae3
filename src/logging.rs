// Logging is file-only: the TUI owns the terminal, so nothing may be
// written to stdout or stderr while it runs.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogSettings;

/// Third-party targets capped at warn unless `RUST_LOG` says otherwise.
const NOISY_TARGETS: &[&str] = &["tokio_postgres", "reqwest", "hyper", "hyper_util", "rustls"];

pub fn default_log_path() -> Result<PathBuf> {
    let mut path = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
    path.push("sqlpilot");
    path.push("sqlpilot.log");
    Ok(path)
}

fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut directives = vec![level.to_string()];
    for target in NOISY_TARGETS {
        directives.push(format!("{}=warn", target));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Install the global subscriber, appending to the configured log file.
pub fn init_logging(settings: &LogSettings) -> Result<PathBuf> {
    let path = match &settings.file {
        Some(path) => path.clone(),
        None => default_log_path()?,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .with_target(true)
        .with_filter(build_env_filter(&settings.level)?);

    tracing_subscriber::registry().with(file_layer).try_init()?;

    tracing::trace!("Logging initialized: level={}, file={}", settings.level, path.display());
    Ok(path)
}
