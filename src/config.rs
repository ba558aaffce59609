use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::clock::{DEFAULT_TIMEZONE, TimeZoneSpec};
use crate::record::Level;
use crate::retention::{DEFAULT_MAX_FILES, RetentionPolicy, RetentionScope};
use crate::rotation::{self, DEFAULT_MAX_FILE_SIZE, RotationPolicy};
use crate::traceback::{
    DEFAULT_CONTEXT_LINES, DEFAULT_EXTRA_LINES, DEFAULT_MAX_FRAMES, TracebackRenderer,
};
use crate::writer::IdentifierHint;
use crate::{Error, Result};

/// Configuration for robot logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable console logging
    #[serde(default = "default_console")]
    pub console: bool,
    /// Explicit level (e.g. "info", "warning"); derived from `env` when unset
    #[serde(default)]
    pub level: Option<String>,
    /// Console format ("text" or "json")
    #[serde(default = "default_format")]
    pub format: String,
    /// Deployment environment; "PROD" logs at INFO, anything else at DEBUG
    #[serde(default = "default_env")]
    pub env: String,
    /// Root directory for log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Number of log files kept
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Size cap per file; a number is read as KB, strings take B/K/M/G units.
    /// `null` disables size rotation.
    #[serde(
        default = "default_max_file_size",
        serialize_with = "rotation::serialize_size",
        deserialize_with = "rotation::deserialize_size"
    )]
    pub max_file_size: Option<u64>,
    /// Robot identifier written into file names
    #[serde(default = "default_robo_id")]
    pub robo_id: String,
    /// Round identifier written into file names
    #[serde(default = "default_round_id")]
    pub round_id: String,
    /// IANA zone name, "UTC" or a fixed offset such as "-03:00"
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Logger name used for records that do not carry one
    #[serde(default = "default_logger_name")]
    pub logger_name: String,
    /// Retention grouping
    #[serde(default)]
    pub retention: RetentionScope,
    /// Traceback limits
    #[serde(default)]
    pub tracebacks: TracebackConfig,
}

/// Limits for rendered tracebacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracebackConfig {
    pub max_frames: usize,
    pub context_lines: usize,
    pub extra_lines: usize,
}

impl Default for TracebackConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            context_lines: DEFAULT_CONTEXT_LINES,
            extra_lines: DEFAULT_EXTRA_LINES,
        }
    }
}

impl TracebackConfig {
    pub fn renderer(&self) -> TracebackRenderer {
        TracebackRenderer::new(self.max_frames, self.context_lines, self.extra_lines)
    }
}

impl LogConfig {
    /// Create a new LogConfig with defaults
    pub fn new() -> Self {
        Self {
            console: default_console(),
            level: None,
            format: default_format(),
            env: default_env(),
            log_dir: default_log_dir(),
            max_files: default_max_files(),
            max_file_size: default_max_file_size(),
            robo_id: default_robo_id(),
            round_id: default_round_id(),
            timezone: default_timezone(),
            logger_name: default_logger_name(),
            retention: RetentionScope::default(),
            tracebacks: TracebackConfig::default(),
        }
    }

    /// Load from the process environment, falling back to defaults.
    ///
    /// Reads `LOG_DIR`, `MAX_FILES`, `MAX_FILE_SIZE`, `ROBO_ID`, `ROUND_ID`,
    /// `TIMEZONE`, `TRACEBACKS_MAX_FRAMES`, `TRACEBACKS_EXTRA_LINES`,
    /// `TRACEBACKS_CONTEXT_LINES`, `ENV`, `LOG_LEVEL` and `LOG_FORMAT`.
    ///
    /// `MAX_FILE_SIZE` follows the config file rule: a number without a unit
    /// is kilobytes, so `MAX_FILE_SIZE=2048` is 2 MiB. Use `B` for bytes
    /// (`1048576B`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::new();

        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(v) = get("MAX_FILES") {
            config.max_files = parse_number("MAX_FILES", &v)?;
        }
        if let Some(v) = get("MAX_FILE_SIZE") {
            let size = rotation::parse_size(&v)
                .map_err(|e| Error::Config(format!("MAX_FILE_SIZE: {e}")))?;
            config.max_file_size = Some(size);
        }
        if let Some(v) = get("ROBO_ID") {
            config.robo_id = v;
        }
        if let Some(v) = get("ROUND_ID") {
            config.round_id = v;
        }
        if let Some(v) = get("TIMEZONE") {
            config.timezone = v;
        }
        if let Some(v) = get("TRACEBACKS_MAX_FRAMES") {
            config.tracebacks.max_frames = parse_number("TRACEBACKS_MAX_FRAMES", &v)?;
        }
        if let Some(v) = get("TRACEBACKS_EXTRA_LINES") {
            config.tracebacks.extra_lines = parse_number("TRACEBACKS_EXTRA_LINES", &v)?;
        }
        if let Some(v) = get("TRACEBACKS_CONTEXT_LINES") {
            config.tracebacks.context_lines = parse_number("TRACEBACKS_CONTEXT_LINES", &v)?;
        }
        if let Some(v) = get("ENV") {
            config.env = v;
        }
        config.level = get("LOG_LEVEL");
        if let Some(v) = get("LOG_FORMAT") {
            config.format = v.to_ascii_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every field, failing on the first bad one.
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(Error::Config("max_files must be at least 1".to_string()));
        }
        if self.max_file_size == Some(0) {
            return Err(Error::Config("max_file_size must be positive".to_string()));
        }
        if self.tracebacks.max_frames == 0 {
            return Err(Error::Config(
                "tracebacks.max_frames must be at least 1".to_string(),
            ));
        }
        self.identifier_hint().validate()?;
        self.time_zone()?;
        self.effective_level()?;
        match self.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(Error::Config(format!(
                    "unknown log format {other:?}, expected \"text\" or \"json\""
                )));
            }
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::Config("log_dir must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether `env` names the production environment.
    pub fn is_prod(&self) -> bool {
        self.env.trim().eq_ignore_ascii_case("prod")
    }

    /// The explicit level, or INFO in production and DEBUG elsewhere.
    pub fn effective_level(&self) -> Result<Level> {
        match &self.level {
            Some(level) => level.parse(),
            None if self.is_prod() => Ok(Level::Info),
            None => Ok(Level::Debug),
        }
    }

    pub fn time_zone(&self) -> Result<TimeZoneSpec> {
        self.timezone.parse()
    }

    /// Stream this configuration writes to.
    pub fn identifier_hint(&self) -> IdentifierHint {
        IdentifierHint::new(self.robo_id.as_str(), self.round_id.as_str())
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            max_file_size: self.max_file_size,
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.max_files).with_scope(self.retention)
    }

    /// Enable console logging
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Set log level
    pub fn with_level(mut self, level: String) -> Self {
        self.level = Some(level);
        self
    }

    /// Set console format
    pub fn with_format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    pub fn with_env(mut self, env: String) -> Self {
        self.env = env;
        self
    }

    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.log_dir = log_dir;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: Option<u64>) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_robo_id(mut self, robo_id: String) -> Self {
        self.robo_id = robo_id;
        self
    }

    pub fn with_round_id(mut self, round_id: String) -> Self {
        self.round_id = round_id;
        self
    }

    pub fn with_timezone(mut self, timezone: String) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_logger_name(mut self, logger_name: String) -> Self {
        self.logger_name = logger_name;
        self
    }

    pub fn with_retention(mut self, retention: RetentionScope) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_tracebacks(mut self, tracebacks: TracebackConfig) -> Self {
        self.tracebacks = tracebacks;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a non-negative integer, got {value:?}")))
}

fn default_console() -> bool {
    true
}

fn default_format() -> String {
    "text".to_string()
}

fn default_env() -> String {
    "DEV".to_string()
}

fn default_log_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_default().join("logs")
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_max_file_size() -> Option<u64> {
    Some(DEFAULT_MAX_FILE_SIZE)
}

fn default_robo_id() -> String {
    "1".to_string()
}

fn default_round_id() -> String {
    "01".to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_logger_name() -> String {
    "root".to_string()
}
