use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

pub enum LogTarget {
    /// Interactive mode: the terminal belongs to the UI.
    File,
    Stderr,
}

fn filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

pub fn log_file_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("vision-architect").join("architect.log"))
}

/// Installs the global subscriber. Returns the log file when logging to one.
pub fn init(target: LogTarget, verbose: bool) -> Result<Option<PathBuf>> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
        LogTarget::File => {
            let path = log_file_path()?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
            Ok(Some(path))
        }
    }
}
