//! Builder pattern for initializing robot logging.
//!
//! # Example
//!
//! ```rust,no_run
//! let _guard = robolog::builder()
//!     .with_log_dir("/var/log/robots")
//!     .with_robo_id("12")
//!     .with_round_id("03")
//!     .with_max_file_size("5M")
//!     .init()
//!     .expect("Failed to initialize logging");
//!
//! tracing::info!(attempt = 1, "robot started");
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::TracebackConfig;
use crate::logger::RobotLogger;
use crate::retention::RetentionScope;
use crate::rotation::parse_size;
use crate::tracing_init::{LoggingGuard, init_logging};
use crate::{Error, LogConfig, Result};

/// A builder for configuring and initializing logging.
///
/// Starts from [`LogConfig::new`] (not the environment); use
/// [`from_config`](Self::from_config) with [`LogConfig::from_env`] to layer
/// code settings on top of environment variables.
#[derive(Debug, Clone)]
pub struct LogBuilder {
    config: LogConfig,
    size_error: Option<String>,
}

impl LogBuilder {
    /// Create a new LogBuilder with default configuration.
    pub fn new() -> Self {
        Self::from_config(LogConfig::new())
    }

    /// Create a LogBuilder from an existing configuration.
    pub fn from_config(config: LogConfig) -> Self {
        Self {
            config,
            size_error: None,
        }
    }

    /// Enable or disable console logging.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config = self.config.with_console(enabled);
        self
    }

    /// Set the log level ("debug", "info", "warning", "error", "critical").
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config = self.config.with_level(level.into());
        self
    }

    /// Set the console output format ("text" or "json").
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.config = self.config.with_format(format.into());
        self
    }

    /// Set the deployment environment ("PROD" lowers verbosity to INFO).
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.config = self.config.with_env(env.into());
        self
    }

    /// Set the log root directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_log_dir(dir.into());
        self
    }

    /// Set how many log files are kept.
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.config = self.config.with_max_files(max_files);
        self
    }

    /// Set the per-file size cap, e.g. `"512K"` or `"10M"`.
    ///
    /// An unparsable size is reported by [`build_logger`](Self::build_logger)
    /// and [`init`](Self::init).
    pub fn with_max_file_size(mut self, size: &str) -> Self {
        match parse_size(size) {
            Ok(bytes) => {
                self.config = self.config.with_max_file_size(Some(bytes));
                self.size_error = None;
            }
            Err(e) => self.size_error = Some(format!("max_file_size: {e}")),
        }
        self
    }

    /// Rotate on date change only.
    pub fn without_size_limit(mut self) -> Self {
        self.config = self.config.with_max_file_size(None);
        self.size_error = None;
        self
    }

    pub fn with_robo_id(mut self, robo_id: impl Into<String>) -> Self {
        self.config = self.config.with_robo_id(robo_id.into());
        self
    }

    pub fn with_round_id(mut self, round_id: impl Into<String>) -> Self {
        self.config = self.config.with_round_id(round_id.into());
        self
    }

    /// Set the time zone (IANA name, "UTC" or "-03:00").
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.config = self.config.with_timezone(timezone.into());
        self
    }

    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_logger_name(name.into());
        self
    }

    pub fn with_retention(mut self, scope: RetentionScope) -> Self {
        self.config = self.config.with_retention(scope);
        self
    }

    pub fn with_tracebacks(mut self, tracebacks: TracebackConfig) -> Self {
        self.config = self.config.with_tracebacks(tracebacks);
        self
    }

    /// Get the current configuration without initializing.
    pub fn build(self) -> LogConfig {
        self.config
    }

    fn checked(self) -> Result<LogConfig> {
        if let Some(e) = self.size_error {
            return Err(Error::Config(e));
        }
        Ok(self.config)
    }

    /// Create a standalone [`RobotLogger`] without touching global state.
    pub fn build_logger(self) -> Result<Arc<RobotLogger>> {
        RobotLogger::init(self.checked()?)
    }

    /// Initialize logging with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The log root cannot be created
    /// - The tracing subscriber is already initialized
    pub fn init(self) -> Result<LoggingGuard> {
        init_logging(&self.checked()?, None)
    }
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_new() {
        let config = LogBuilder::new().build();
        assert_eq!(config, LogConfig::new());
    }

    #[test]
    fn test_builder_chaining() {
        let config = LogBuilder::new()
            .with_console(false)
            .with_level("warning")
            .with_format("json")
            .with_env("PROD")
            .with_log_dir("/tmp/robots")
            .with_max_files(3)
            .with_max_file_size("2M")
            .with_robo_id("12")
            .with_round_id("03")
            .with_timezone("UTC")
            .with_logger_name("robot")
            .with_retention(RetentionScope::Directory)
            .build();

        assert!(!config.console);
        assert_eq!(config.level.as_deref(), Some("warning"));
        assert_eq!(config.format, "json");
        assert_eq!(config.env, "PROD");
        assert_eq!(config.log_dir, PathBuf::from("/tmp/robots"));
        assert_eq!(config.max_files, 3);
        assert_eq!(config.max_file_size, Some(2 * 1024 * 1024));
        assert_eq!(config.robo_id, "12");
        assert_eq!(config.round_id, "03");
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.logger_name, "robot");
        assert_eq!(config.retention, RetentionScope::Directory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_from_config() {
        let original = LogConfig::new().with_robo_id("9".to_string());
        let config = LogBuilder::from_config(original.clone()).build();
        assert_eq!(config, original);
    }

    #[test]
    fn test_bad_size_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = LogBuilder::new()
            .with_console(false)
            .with_log_dir(dir.path())
            .with_max_file_size("ten")
            .build_logger();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_logger_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = LogBuilder::new()
            .with_console(false)
            .with_log_dir(dir.path())
            .with_robo_id("5")
            .without_size_limit()
            .build_logger()
            .unwrap();
        let path = logger.current_file().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("5_01_"));
    }
}
