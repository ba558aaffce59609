//! Human-readable rendering for the console sink.

use std::fmt::Write as _;

use chrono::SecondsFormat;

use crate::record::{Level, LogRecord};

const RESET: &str = "\x1b[0m";
const DIMMED: &str = "\x1b[2m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => "\x1b[34m",
        Level::Info => "\x1b[32m",
        Level::Warning => "\x1b[33m",
        Level::Error => "\x1b[31m",
        Level::Critical => "\x1b[1;31m",
    }
}

/// Render `record` as one or more console lines (no trailing newline).
///
/// Unlike the file sink the console keeps the text as-is, emoji included.
pub fn render_text(record: &LogRecord, ansi: bool) -> String {
    let mut out = String::with_capacity(128);
    let timestamp = record
        .timestamp()
        .to_rfc3339_opts(SecondsFormat::Millis, false);
    let level = format!("{:<8}", record.level().as_str());

    if ansi {
        let _ = write!(
            out,
            "{DIMMED}{timestamp}{RESET} {}{level}{RESET} {DIMMED}{}:{RESET} {}",
            level_color(record.level()),
            record.logger_name(),
            record.message()
        );
    } else {
        let _ = write!(
            out,
            "{timestamp} {level} {}: {}",
            record.logger_name(),
            record.message()
        );
    }

    if !record.custom_args().is_empty() {
        let args: Vec<String> = record.custom_args().iter().map(|v| v.to_string()).collect();
        let _ = write!(out, " [{}]", args.join(", "));
    }
    if let Some(location) = record.source_location() {
        let _ = write!(out, " ({}:{})", location.file, location.line);
    }
    if let Some(exception) = record.exception() {
        for line in exception.rendered_traceback.lines() {
            out.push_str("\n    ");
            out.push_str(line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExceptionRecord, SourceLocation, Value};
    use chrono::{FixedOffset, TimeZone};

    fn record() -> LogRecord {
        let ts = FixedOffset::west_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 9, 8, 5, 7)
            .unwrap();
        LogRecord::new(ts, Level::Warning, "robot.arm", "grip slipped 🤖")
    }

    #[test]
    fn test_plain_layout() {
        let rec = record()
            .with_args([Value::from(3), Value::from("left")])
            .with_location(SourceLocation {
                file: "src/arm.rs".to_string(),
                line: 40,
            });
        assert_eq!(
            render_text(&rec, false),
            "2026-03-09T08:05:07.000-03:00 WARNING  robot.arm: grip slipped 🤖 [3, left] (src/arm.rs:40)"
        );
    }

    #[test]
    fn test_traceback_is_indented() {
        let rec = record().with_exception(ExceptionRecord {
            exc_type_name: "panic".to_string(),
            exc_message: "boom".to_string(),
            rendered_traceback: "panic: boom\nat src/a.rs:1 in a::b".to_string(),
        });
        let text = render_text(&rec, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "    panic: boom");
        assert_eq!(lines[2], "    at src/a.rs:1 in a::b");
    }

    #[test]
    fn test_ansi_colors_level() {
        let text = render_text(&record(), true);
        assert!(text.contains("\x1b[33mWARNING"));
        assert!(text.ends_with("grip slipped 🤖"));
    }
}
