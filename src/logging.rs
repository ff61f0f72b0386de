//! Tracing setup: a daily-rolling log file, plus stderr when asked.
//!
//! Command output goes to stdout, so logs never share it.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Keeps the background log writer alive; drop it last.
pub struct LogGuard {
  _guard: WorkerGuard,
}

/// Default log directory: $XDG_DATA_HOME/v9s/logs
pub fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("v9s").join("logs"))
}

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
pub fn init(log_dir: &Path, default_level: &str, verbose: bool) -> Result<LogGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let filter = || {
    EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))
  };

  let file_appender = tracing_appender::rolling::daily(log_dir, "v9s.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .with_filter(filter().map_err(|e| eyre!("Invalid log filter: {}", e))?);

  let stderr_layer = if verbose {
    Some(
      tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter().map_err(|e| eyre!("Invalid log filter: {}", e))?),
    )
  } else {
    None
  };

  tracing_subscriber::registry()
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  tracing::debug!(dir = %log_dir.display(), "logging initialized");

  Ok(LogGuard { _guard: guard })
}
