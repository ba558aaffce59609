//! The logging coordinator.
//!
//! [`RobotLogger`] ties the pieces together: it stamps records with the
//! configured clock, prints them to the console, encodes them with
//! [`SafeJsonEncoder`] and appends them through the [`RotationEngine`].
//! File write failures never reach the caller; they are counted and reported
//! on the crate's own `tracing` target.

use std::cell::Cell;
use std::error::Error as StdError;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, FixedOffset};

use crate::capture::{self, PanicReport, PanicSink};
use crate::clock::{Clock, ZoneClock};
use crate::config::LogConfig;
use crate::console;
use crate::encoder::SafeJsonEncoder;
use crate::record::{ExceptionRecord, Level, LogRecord, SourceLocation, Value};
use crate::traceback::{ExceptionInfo, TracebackRenderer};
use crate::writer::{RotationEngine, WriteHandle};
use crate::{Error, Result};

// Report the first write failure, then one in every this many.
const FAILURE_REPORT_INTERVAL: u64 = 1000;

thread_local! {
    static WRITING: Cell<bool> = const { Cell::new(false) };
}

/// Set while this thread is inside the file pipeline.
struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        if WRITING.with(|flag| flag.replace(true)) {
            None
        } else {
            Some(Self)
        }
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        WRITING.with(|flag| flag.set(false));
    }
}

/// Console plus rotating JSON file logging for one robot process.
pub struct RobotLogger {
    config: LogConfig,
    clock: Arc<dyn Clock>,
    engine: RotationEngine,
    handle: RwLock<Option<WriteHandle>>,
    encoder: SafeJsonEncoder,
    renderer: TracebackRenderer,
    min_level: Level,
    ansi: bool,
    failed_writes: AtomicU64,
}

impl std::fmt::Debug for RobotLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotLogger")
            .field("engine", &self.engine)
            .field("min_level", &self.min_level)
            .field("failed_writes", &self.failed_writes())
            .finish_non_exhaustive()
    }
}

impl RobotLogger {
    /// Validate `config`, open the first log file and return the logger.
    pub fn init(config: LogConfig) -> Result<Arc<Self>> {
        let clock = Arc::new(ZoneClock::new(config.time_zone()?));
        Self::with_clock(config, clock)
    }

    /// Like [`init`](Self::init) with an explicit time source.
    pub fn with_clock(config: LogConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        config.validate()?;
        let engine = RotationEngine::new(
            &config.log_dir,
            config.rotation_policy(),
            config.retention_policy(),
            Arc::clone(&clock),
        )?;
        let handle = engine.acquire_writer(&config.identifier_hint())?;
        tracing::debug!(root = %engine.root().display(), "robot logger initialized");

        Ok(Arc::new(Self {
            min_level: config.effective_level()?,
            renderer: config.tracebacks.renderer(),
            ansi: cfg!(feature = "ansi") && std::io::stderr().is_terminal(),
            config,
            clock,
            engine,
            handle: RwLock::new(Some(handle)),
            encoder: SafeJsonEncoder::new(),
            failed_writes: AtomicU64::new(0),
        }))
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    /// Lowest level that is logged.
    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// Current time in the configured zone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    /// File currently receiving records, `None` after shutdown.
    pub fn current_file(&self) -> Option<PathBuf> {
        let handle = self.handle.read().unwrap_or_else(PoisonError::into_inner);
        handle.as_ref().and_then(|h| self.engine.current_path(h))
    }

    /// Number of records that could not be written to the file.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    /// A logger that stamps records with `name`.
    pub fn get_logger(self: &Arc<Self>, name: impl Into<String>) -> NamedLogger {
        NamedLogger {
            logger: Arc::clone(self),
            name: name.into(),
        }
    }

    /// Send `record` to both sinks if its level passes the filter.
    pub fn log(&self, record: LogRecord) {
        if record.level() < self.min_level {
            return;
        }
        if self.config.console {
            self.print(&record);
        }
        self.write_quietly(&record);
    }

    /// Append `record` to the log file, bypassing the level filter and the
    /// console.
    pub fn write_record(&self, record: &LogRecord) -> Result<()> {
        let line = self.encoder.encode(record);
        let handle = self.handle.read().unwrap_or_else(PoisonError::into_inner);
        match handle.as_ref() {
            Some(handle) => self.engine.write(handle, &line),
            None => Err(Error::HandleClosed),
        }
    }

    /// [`write_record`](Self::write_record) with failures counted instead of
    /// returned.
    pub(crate) fn write_quietly(&self, record: &LogRecord) {
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };
        match self.write_record(record) {
            Ok(()) | Err(Error::HandleClosed) => {}
            Err(e) => self.report_failure(&e),
        }
    }

    fn report_failure(&self, err: &Error) {
        let failures = self.failed_writes.fetch_add(1, Ordering::Relaxed) + 1;
        if failures == 1 || failures % FAILURE_REPORT_INTERVAL == 0 {
            tracing::warn!(target: "robolog", failures, error = %err, "failed to write log record");
        }
    }

    fn print(&self, record: &LogRecord) {
        let text = console::render_text(record, self.ansi);
        let _ = writeln!(std::io::stderr().lock(), "{text}");
    }

    /// Log `message` at `level` under `logger_name` with the caller's location.
    #[track_caller]
    pub fn emit<I, V>(&self, level: Level, logger_name: &str, message: impl Into<String>, args: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if level < self.min_level {
            return;
        }
        let record = LogRecord::new(self.now(), level, logger_name, message)
            .with_location(SourceLocation::caller())
            .with_args(args);
        self.log(record);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Level::Debug, &self.config.logger_name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, &self.config.logger_name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Level::Warning, &self.config.logger_name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, &self.config.logger_name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.emit(Level::Critical, &self.config.logger_name, message, NO_ARGS);
    }

    /// Log `err` at ERROR with its cause chain and the current stack.
    #[track_caller]
    pub fn exception<E: StdError + 'static>(&self, message: impl Into<String>, err: &E) {
        let location = SourceLocation::caller();
        let info = ExceptionInfo::from_error(err);
        self.exception_at(&self.config.logger_name, message.into(), info, location);
    }

    fn exception_at(
        &self,
        logger_name: &str,
        message: String,
        info: ExceptionInfo,
        location: SourceLocation,
    ) {
        if Level::Error < self.min_level {
            return;
        }
        let info = info.capture_backtrace();
        let record = LogRecord::new(self.now(), Level::Error, logger_name, message)
            .with_location(location)
            .with_exception(self.renderer.render(&info));
        self.log(record);
    }

    /// Render `info` with the configured limits.
    pub fn render_exception(&self, info: &ExceptionInfo) -> ExceptionRecord {
        self.renderer.render(info)
    }

    /// Report every panic in the process through this logger.
    pub fn install_panic_capture(self: &Arc<Self>) {
        capture::install(Arc::clone(self) as Arc<dyn PanicSink>);
    }

    /// Release the log file. Later records only reach the console.
    pub fn shutdown(&self) {
        let handle = self
            .handle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = self.engine.close(handle) {
                tracing::warn!(target: "robolog", error = %e, "failed to close log file");
            }
        }
    }
}

const NO_ARGS: [Value; 0] = [];

impl PanicSink for RobotLogger {
    fn on_panic(&self, report: &PanicReport) {
        let info = ExceptionInfo::new("panic", report.message.as_str())
            .with_frames(report.frames.clone());
        let mut record = LogRecord::new(
            self.now(),
            Level::Critical,
            "panic",
            format!("Unhandled panic in thread {}", report.thread),
        )
        .with_exception(self.renderer.render(&info));
        if let Some(location) = &report.location {
            record = record.with_location(location.clone());
        }
        self.log(record);
    }
}

impl Drop for RobotLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A [`RobotLogger`] view with its own logger name.
#[derive(Debug, Clone)]
pub struct NamedLogger {
    logger: Arc<RobotLogger>,
    name: String,
}

impl NamedLogger {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log with custom arguments, kept in order in `customargs`.
    #[track_caller]
    pub fn log_with_args<I, V>(&self, level: Level, message: impl Into<String>, args: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.logger.emit(level, &self.name, message, args);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.logger.emit(Level::Debug, &self.name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.logger.emit(Level::Info, &self.name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.logger.emit(Level::Warning, &self.name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.logger.emit(Level::Error, &self.name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.logger.emit(Level::Critical, &self.name, message, NO_ARGS);
    }

    #[track_caller]
    pub fn exception<E: StdError + 'static>(&self, message: impl Into<String>, err: &E) {
        let location = SourceLocation::caller();
        let info = ExceptionInfo::from_error(err);
        self.logger
            .exception_at(&self.name, message.into(), info, location);
    }
}
