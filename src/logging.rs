//! Tracing setup: a daily log file under the data dir, or stderr on request.
//!
//! The filter comes from `VIDSIFT_LOG` (same syntax as `RUST_LOG`) and
//! defaults to `info`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::project_dirs;

pub const LOG_ENV: &str = "VIDSIFT_LOG";

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered lines reach the file.
pub fn init(to_stderr: bool) -> Result<Option<WorkerGuard>> {
  if to_stderr {
    tracing_subscriber::registry()
      .with(env_filter())
      .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
      .try_init()
      .context("Failed to install log subscriber")?;
    return Ok(None);
  }

  let dirs = project_dirs().context("No home directory for log files")?;
  init_file(dirs.data_dir()).map(Some)
}

pub fn init_file(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir {}", dir.display()))?;
  let appender = tracing_appender::rolling::daily(dir, "vidsift.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::registry()
    .with(env_filter())
    .with(fmt::layer().with_ansi(false).with_writer(writer))
    .try_init()
    .context("Failed to install log subscriber")?;
  Ok(guard)
}
