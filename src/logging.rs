/// Tracing setup with file rotation
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/EssentialCore/logs/
/// - Windows: %APPDATA%/EssentialCore/logs/
/// - Linux: ~/.config/EssentialCore/logs/
///
/// Files rotate daily (`essential-core.YYYY-MM-DD.log`). Debug builds also
/// log to the console.

use std::path::PathBuf;

use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;

pub const LOG_TARGET_STARTUP: &str = "essential_core::startup";

const LOG_FILE_PREFIX: &str = "essential-core.log";

/// `<config_dir>/EssentialCore/logs`, or `./logs` without a config dir
pub fn log_dir() -> PathBuf {
    AppConfig::app_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Filter from `RUST_LOG`, falling back to `default_level`, then `warn`
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(default_level: &str) {
    let log_dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let console_layer = cfg!(debug_assertions).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    let installed = tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if installed.is_ok() {
        tracing::info!(
            target: LOG_TARGET_STARTUP,
            "Starting Essential Core v{} on {}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::ARCH
        );
        tracing::info!("Log directory: {}", log_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_name() {
        assert!(log_dir().ends_with("logs"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // Must not panic on a bad directive
        let _ = build_filter("not a [valid filter");
    }
}
