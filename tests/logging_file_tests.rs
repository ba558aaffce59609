use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use robolog::clock::ManualClock;
use robolog::{JsonFileLayer, LogConfig, RobotLogger};
use tracing_subscriber::layer::SubscriberExt;

fn logger(dir: &std::path::Path) -> Arc<RobotLogger> {
    let start = FixedOffset::west_opt(3 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 3, 9, 14, 30, 0)
        .unwrap();
    let cfg = LogConfig::new()
        .with_console(false)
        .with_log_dir(dir.to_path_buf())
        .with_robo_id("4".to_string())
        .with_round_id("02".to_string());
    RobotLogger::with_clock(cfg, Arc::new(ManualClock::new(start))).expect("logger")
}

fn read_lines(logger: &RobotLogger) -> Vec<serde_json::Value> {
    let path = logger.current_file().expect("current file");
    std::fs::read_to_string(path)
        .expect("read log file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

fn with_layer(logger: &Arc<RobotLogger>, f: impl FnOnce()) {
    let subscriber = tracing_subscriber::registry().with(JsonFileLayer::new(Arc::clone(logger)));
    tracing::subscriber::with_default(subscriber, f);
}

#[test]
fn test_event_fields_become_custom_args() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger(dir.path());

    with_layer(&logger, || {
        tracing::info!(attempt = 2, user = "joão", ok = true, "login finished");
    });

    let lines = read_lines(&logger);
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["level"], "INFO");
    assert_eq!(line["message"], "login finished");
    assert_eq!(line["name"], "logging_file_tests");
    assert_eq!(line["timestamp"], "2026-03-09T14:30:00.000-03:00");
    assert_eq!(line["customargs"], serde_json::json!([2, "joão", true]));
    assert!(line["pathname"].as_str().unwrap().ends_with("logging_file_tests.rs"));
    assert!(line["lineno"].as_u64().unwrap() > 0);
}

#[test]
fn test_file_is_ascii_without_emoji() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger(dir.path());

    with_layer(&logger, || {
        tracing::warn!("pedido concluído ✅ 🚀");
    });

    let path = logger.current_file().unwrap();
    let raw = std::fs::read_to_string(path).unwrap();
    assert!(raw.is_ascii());
    assert!(!raw.contains("\x1b"), "ANSI escape found in log file");
    assert!(raw.contains(r"conclu\u00eddo"), "{raw}");

    let lines = read_lines(&logger);
    assert_eq!(lines[0]["level"], "WARNING");
    assert_eq!(lines[0]["message"], "pedido concluído  ");
}

#[test]
fn test_error_field_becomes_exception() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger(dir.path());
    let err = "x12".parse::<u32>().unwrap_err();

    with_layer(&logger, || {
        tracing::error!(error = &err as &dyn std::error::Error, "could not read counter");
    });

    let lines = read_lines(&logger);
    let line = &lines[0];
    assert_eq!(line["level"], "ERROR");
    assert_eq!(line["exc_name"], "Error");
    assert_eq!(line["exc_message"], "invalid digit found in string");
    assert_eq!(line["customargs"], serde_json::json!([]));
    assert!(
        line["exc_info"]
            .as_str()
            .unwrap()
            .starts_with("Error: invalid digit found in string")
    );
}

#[test]
fn test_own_events_are_not_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logger = logger(dir.path());

    with_layer(&logger, || {
        tracing::warn!(target: "robolog", "internal notice");
        tracing::debug!(target: "robolog::writer", "internal detail");
        tracing::info!("visible");
    });

    let lines = read_lines(&logger);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "visible");
}
