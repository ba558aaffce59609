use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::logger::RobotLogger;
use crate::record::{Level, LogRecord, SourceLocation, Value};
use crate::traceback::ExceptionInfo;

/// `tracing_subscriber` layer that writes every event it sees to the robot's
/// JSON log files.
///
/// The event's `message` becomes the record message, every other field is
/// appended to `customargs` in declaration order, and a field recorded as an
/// error (`error = &err as &dyn Error`) becomes the record's exception.
/// Events from this crate's own target are skipped so a failing log file can
/// be reported without feeding back into itself.
#[derive(Debug, Clone)]
pub struct JsonFileLayer {
    logger: Arc<RobotLogger>,
}

impl JsonFileLayer {
    pub fn new(logger: Arc<RobotLogger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<RobotLogger> {
        &self.logger
    }
}

fn is_own_target(target: &str) -> bool {
    target == "robolog" || target.starts_with("robolog::")
}

impl<S> Layer<S> for JsonFileLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            self.logger.now(),
            Level::from(*meta.level()),
            meta.target(),
            visitor.message.unwrap_or_default(),
        )
        .with_args(visitor.args);
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            record = record.with_location(SourceLocation {
                file: file.to_string(),
                line,
            });
        }
        if let Some(info) = visitor.error {
            record = record.with_exception(self.logger.render_exception(&info));
        }
        self.logger.write_quietly(&record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    args: Vec<Value>,
    error: Option<ExceptionInfo>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.args.push(value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::UInt(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn StdError + 'static)) {
        if self.error.is_none() {
            self.error = Some(ExceptionInfo::from_dyn_error(value, "Error"));
        } else {
            self.push(field, Value::Text(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::Text(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_target_detection() {
        assert!(is_own_target("robolog"));
        assert!(is_own_target("robolog::writer"));
        assert!(!is_own_target("robolog_demo"));
        assert!(!is_own_target("my_robot::steps"));
    }
}
