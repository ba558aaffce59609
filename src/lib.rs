//! # Robolog
//!
//! Dual-sink logging for automation robots: human-readable console output
//! plus rotating JSON-lines files that legacy tools can always read.
//!
//! ## Features
//!
//! - Files named `{robot}_{part}_{YYYYMMDD}_{HHMMSS}_{round}.log` under
//!   `<root>/<YYYY-MM>/<DD>/`, rotated by size and date
//! - Retention that keeps the newest `max_files` and never deletes an open file
//! - ASCII-only JSON: emoji removed, everything else non-ASCII escaped
//! - Compact tracebacks with a hard line bound
//! - Panic capture on every thread
//! - Integration with the `tracing` ecosystem
//!
//! ## Example
//!
//! ```rust,no_run
//! use robolog::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env()?;
//! let _guard = init_logging(&config, None)?;
//!
//! tracing::info!(step = "login", "robot started");
//! # Ok::<(), robolog::Error>(())
//! ```

pub mod builder;
pub mod capture;
pub mod clock;
pub mod config;
pub mod console;
pub mod encoder;
pub mod error;
pub mod filename;
pub mod layer;
pub mod logger;
pub mod record;
pub mod retention;
pub mod rotation;
pub mod traceback;
pub mod tracing_init;
pub mod writer;

pub use builder::LogBuilder;
pub use capture::{PanicReport, PanicSink};
pub use clock::{Clock, TimeZoneSpec, ZoneClock};
pub use config::{LogConfig, TracebackConfig};
pub use encoder::{SafeJsonEncoder, strip_pictographs};
pub use error::{Error, MalformedFilenameError, Result};
pub use filename::FileIdentifier;
pub use layer::JsonFileLayer;
pub use logger::{NamedLogger, RobotLogger};
pub use record::{ExceptionRecord, Level, LogRecord, SourceLocation, Value};
pub use retention::{RetentionPolicy, RetentionReport, RetentionScope};
pub use rotation::{RotationPolicy, RotationReason};
pub use traceback::{ExceptionInfo, Frame, TracebackRenderer};
pub use tracing_init::{LoggingGuard, init_logging, init_with_logger};
pub use writer::{IdentifierHint, RotationEngine, WriteHandle};

/// Start configuring logging.
pub fn builder() -> LogBuilder {
    LogBuilder::new()
}
