use std::fmt;
use std::panic::Location;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};

use crate::{Error, Result};

/// Severity of a record, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected that the robot recovered from.
    Warning,
    /// An operation failed.
    Error,
    /// The robot cannot continue.
    Critical,
}

impl Level {
    /// Upper-case name as written to log files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Equivalent `tracing` filter directive.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => Err(Error::Config(format!("unknown log level: {other}"))),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// A scalar attached to a record as a custom argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            // JSON has no NaN or infinity
            Self::Float(v) => serializer.serialize_str(&v.to_string()),
            Self::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty => $conv:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(<$conv>::from(v))
                }
            }
        )+
    };
}

value_from!(Int: i8 => i64, i16 => i64, i32 => i64, i64 => i64);
value_from!(UInt: u8 => u64, u16 => u64, u32 => u64, u64 => u64);
value_from!(Float: f32 => f64, f64 => f64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Where a record was emitted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path as reported by the compiler.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl SourceLocation {
    /// Location of the caller of a `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

/// An error or panic attached to a record, already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    /// Short type name, e.g. `ParseIntError` or `panic`.
    pub exc_type_name: String,
    /// The error's display text.
    pub exc_message: String,
    /// Compact traceback text.
    pub rendered_traceback: String,
}

/// One logging event.
///
/// Built once with the consuming `with_*` methods and read through accessors;
/// records are never mutated after they are handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    timestamp: DateTime<FixedOffset>,
    level: Level,
    message: String,
    logger_name: String,
    source_location: Option<SourceLocation>,
    custom_args: Vec<Value>,
    exception: Option<ExceptionRecord>,
}

impl LogRecord {
    /// Create a record without location, arguments or exception.
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        level: Level,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            logger_name: logger_name.into(),
            source_location: None,
            custom_args: Vec::new(),
            exception: None,
        }
    }

    /// Attach the call site.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.source_location = Some(location);
        self
    }

    /// Append custom arguments, keeping their order.
    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.custom_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Attach a rendered exception.
    pub fn with_exception(mut self, exception: ExceptionRecord) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn source_location(&self) -> Option<&SourceLocation> {
        self.source_location.as_ref()
    }

    pub fn custom_args(&self) -> &[Value] {
        &self.custom_args
    }

    pub fn exception(&self) -> Option<&ExceptionRecord> {
        self.exception.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 5, 1, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("trace".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!(" Critical ".parse::<Level>().unwrap(), Level::Critical);
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warning);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Debug);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3u8), Value::UInt(3));
        assert_eq!(Value::from(-3i32), Value::Int(-3));
        assert_eq!(Value::from("x"), Value::Text("x".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
    }

    #[test]
    fn test_value_serializes_non_finite_as_text() {
        let json = serde_json::to_string(&vec![Value::Float(f64::NAN), Value::Float(1.5)]).unwrap();
        assert_eq!(json, r#"["NaN",1.5]"#);
    }

    #[test]
    fn test_record_builder_keeps_arg_order() {
        let record = LogRecord::new(ts(), Level::Info, "app.worker", "done")
            .with_args([Value::from(1), Value::from("two")])
            .with_args([3.5]);
        assert_eq!(
            record.custom_args(),
            &[Value::Int(1), Value::Text("two".into()), Value::Float(3.5)]
        );
        assert_eq!(record.logger_name(), "app.worker");
        assert!(record.exception().is_none());
    }

    #[test]
    fn test_source_location_caller() {
        let location = SourceLocation::caller();
        assert!(location.file.ends_with("record.rs"));
        assert!(location.line > 0);
    }
}
