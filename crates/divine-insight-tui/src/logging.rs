//! File logging for the TUI.
//!
//! The terminal belongs to ratatui, so `tracing` output goes to
//! `<data dir>/divine-insight/divine-insight.log` instead of stderr.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn,divine_insight_core=info,divine_insight_tui=info";

/// Install the global subscriber. Returns the log file path, or `None` when
/// logging is disabled because the file could not be opened.
pub fn init() -> Option<PathBuf> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;

    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(build_env_filter())
        .with(layer)
        .try_init()
        .ok()?;

    Some(path)
}

pub fn log_path() -> Option<PathBuf> {
    Some(dirs::data_dir()?.join("divine-insight").join("divine-insight.log"))
}

/// `RUST_LOG` wins over the default filter
fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_lives_in_app_data_dir() {
        if let Some(path) = log_path() {
            assert!(path.ends_with("divine-insight/divine-insight.log"));
        }
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
