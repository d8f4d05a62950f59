//! Structured logger.
//!
//! Console output for operators plus an optional daily-rolling JSON file,
//! with `RUST_LOG` taking precedence over the configured level.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "chartforge.log";

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    /// Writes NDJSON to `<dir>/chartforge.log.YYYY-MM-DD` when set.
    pub file_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
        }
    }
}

/// The filter used when `RUST_LOG` is unset or unparsable.
pub fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global structured logger.
///
/// Returns `Ok(false)` if a subscriber was already installed.
pub fn init_logger(settings: &LogSettings) -> Result<bool> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&settings.level));

    let file_layer = match &settings.file_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .build(dir)
                .with_context(|| format!("Failed to open log directory: {}", dir.display()))?;
            Some(fmt::layer().json().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    Ok(tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_falls_back_to_info() {
        assert_eq!(default_filter("chartforge=bogus").to_string(), "info");
        assert_eq!(default_filter("debug").to_string(), "debug");
    }
}
