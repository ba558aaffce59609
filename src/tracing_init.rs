use std::sync::Arc;

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::capture;
use crate::layer::JsonFileLayer;
use crate::logger::RobotLogger;
use crate::record::Level;
use crate::{Error, LogConfig, Result};

/// Keeps robot logging alive. Dropping it removes the panic hook and
/// releases the log file.
#[must_use = "dropping the guard shuts logging down"]
#[derive(Debug)]
pub struct LoggingGuard {
    logger: Arc<RobotLogger>,
}

impl LoggingGuard {
    pub fn logger(&self) -> &Arc<RobotLogger> {
        &self.logger
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        capture::uninstall();
        self.logger.shutdown();
    }
}

/// Initialize logging with the given configuration and optional CLI verbosity override.
///
/// Installs a global subscriber with an `EnvFilter`, a console layer (when
/// enabled) and the JSON file layer, then routes panics to the log.
pub fn init_logging(config: &LogConfig, cli_verbose: Option<u8>) -> Result<LoggingGuard> {
    let logger = RobotLogger::init(config.clone())?;
    init_with_logger(logger, cli_verbose)
}

/// Like [`init_logging`] for an already constructed logger.
pub fn init_with_logger(logger: Arc<RobotLogger>, cli_verbose: Option<u8>) -> Result<LoggingGuard> {
    let config = logger.config();
    let rust_log = std::env::var("RUST_LOG").ok();
    let log_spec = effective_log_spec(logger.min_level(), cli_verbose, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&log_spec).map_err(|e| Error::Init(e.to_string()))?;

    let console_layer = config.console.then(|| {
        let builder = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false);
        if config.format == "json" {
            builder.json().boxed()
        } else {
            builder.boxed()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(JsonFileLayer::new(Arc::clone(&logger)))
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))?;

    logger.install_panic_capture();
    Ok(LoggingGuard { logger })
}

/// Determine the effective filter directive.
///
/// A non-empty `RUST_LOG` wins, then the CLI verbosity, then the configured
/// level (which also applies to this crate's own events).
fn effective_log_spec(level: Level, cli_verbose: Option<u8>, rust_log: Option<&str>) -> String {
    if let Some(rust_log) = rust_log.filter(|s| !s.trim().is_empty()) {
        return rust_log.to_string();
    }

    let level = level.as_directive();
    match cli_verbose {
        Some(0) => level.to_string(),
        Some(1) => format!("{level},robolog=debug"),
        Some(2) => format!("{level},robolog=trace"),
        Some(_) => "trace".to_string(),
        None => format!("{level},robolog={level}"),
    }
}
