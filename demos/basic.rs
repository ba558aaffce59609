//! Basic robot logging example.
//!
//! Reads the usual environment variables (`LOG_DIR`, `ROBO_ID`, `ROUND_ID`,
//! `TIMEZONE`, ...) and logs through both `tracing` and the direct API.
//!
//! Run with:
//! ```bash
//! ROBO_ID=7 LOG_DIR=/tmp/robot-logs cargo run --example basic
//! ```

use robolog::{Level, LogConfig, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LogConfig::from_env()?;
    let guard = robolog::init_logging(&config, None)?;

    tracing::info!(step = "login", attempt = 1, "robot started 🚀");
    tracing::warn!(queue = "invoices", pending = 12, "queue is backing up");

    let logger = guard.logger();
    let invoices = logger.get_logger("robot.invoices");
    invoices.log_with_args(
        Level::Info,
        "invoice processed ✅",
        [Value::from("NF-1042"), Value::from(1530.75)],
    );

    if let Err(err) = "12a".parse::<u32>() {
        logger.exception("could not parse invoice number", &err);
    }

    if let Some(path) = logger.current_file() {
        println!("records written to {}", path.display());
    }
    Ok(())
}
