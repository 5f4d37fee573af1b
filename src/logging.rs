// ABOUTME: Tracing subscriber setup: optional console output and an optional daily rolling JSON log file
// ABOUTME: The returned guard must live until exit or buffered file lines are lost

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use warden_core::{config::LoggingConfig, paths};

const LOG_FILE_PREFIX: &str = "warden.log";

/// Crypto backup and session noise is suppressed unless RUST_LOG asks for it
pub fn default_directives(level: &str) -> String {
    format!(
        "{},matrix_sdk_crypto::backups=error,matrix_sdk_crypto::session_manager::sessions=error",
        level
    )
}

pub fn log_directory(config: &LoggingConfig) -> PathBuf {
    config
        .file_logging
        .directory
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(paths::log_dir)
}

/// Install the global subscriber. RUST_LOG takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.level)))
        .context("Invalid logging.level filter")?;

    let console_layer = config
        .console_logging
        .enabled
        .then(|| tracing_subscriber::fmt::layer().boxed());

    let (file_layer, guard) = if config.file_logging.enabled {
        let directory = log_directory(config);
        std::fs::create_dir_all(&directory).with_context(|| {
            format!("Failed to create log directory {}", directory.display())
        })?;

        let appender = tracing_appender::rolling::daily(&directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::config::{ConsoleLoggingConfig, FileLoggingConfig};

    #[test]
    fn test_default_directives_start_with_level() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_configured_log_directory_wins() {
        let config = LoggingConfig {
            level: "info".to_string(),
            console_logging: ConsoleLoggingConfig { enabled: false },
            file_logging: FileLoggingConfig {
                enabled: true,
                directory: Some("/var/log/warden".to_string()),
            },
        };
        assert_eq!(log_directory(&config), PathBuf::from("/var/log/warden"));
    }

    #[test]
    fn test_default_log_directory_is_xdg() {
        assert_eq!(log_directory(&LoggingConfig::default()), paths::log_dir());
    }
}
