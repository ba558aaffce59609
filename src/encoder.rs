//! ASCII-safe JSON lines for log files.
//!
//! Downstream consumers of robot logs are legacy tools that assume every byte
//! is printable ASCII. The encoder therefore:
//!
//! 1. deletes pictographic characters (emoji, dingbats, flags and the joiners
//!    and variation selectors that glue them together);
//! 2. writes every remaining non-ASCII character as a `\uXXXX` escape;
//! 3. emits the fields in a fixed order on a single line.
//!
//! The same record always produces the same bytes.

use std::borrow::Cow;
use std::io;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::ser::Formatter;

use crate::record::{LogRecord, Value};

/// Serializes [`LogRecord`]s into single-line JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeJsonEncoder;

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'static str,
    message: Cow<'a, str>,
    name: Cow<'a, str>,
    pathname: Cow<'a, str>,
    lineno: u32,
    customargs: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exc_name: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exc_message: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exc_info: Option<Cow<'a, str>>,
}

impl SafeJsonEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode `record` as one line, without the trailing newline.
    pub fn encode(&self, record: &LogRecord) -> String {
        let mut line = JsonLine::from_record(record);
        if let Some(encoded) = to_ascii_json(&line) {
            return encoded;
        }

        // Unreachable with the current value types.
        line.customargs = line
            .customargs
            .iter()
            .map(|v| Value::Text(v.to_string()))
            .collect();
        if let Some(encoded) = to_ascii_json(&line) {
            return encoded;
        }

        format!(
            r#"{{"timestamp":"{}","level":"{}","message":"<unencodable record>"}}"#,
            line.timestamp, line.level
        )
    }
}

impl<'a> JsonLine<'a> {
    fn from_record(record: &'a LogRecord) -> Self {
        let location = record.source_location();
        let exception = record.exception();
        Self {
            timestamp: record
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Millis, false),
            level: record.level().as_str(),
            message: strip_pictographs(record.message()),
            name: strip_pictographs(record.logger_name()),
            pathname: location.map_or(Cow::Borrowed(""), |l| strip_pictographs(&l.file)),
            lineno: location.map_or(0, |l| l.line),
            customargs: record.custom_args().iter().map(sanitize_value).collect(),
            exc_name: exception.map(|e| strip_pictographs(&e.exc_type_name)),
            exc_message: exception.map(|e| strip_pictographs(&e.exc_message)),
            exc_info: exception.map(|e| strip_pictographs(&e.rendered_traceback)),
        }
    }
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Text(text) => Value::Text(strip_pictographs(text).into_owned()),
        Value::Float(f) if !f.is_finite() => Value::Text(f.to_string()),
        other => other.clone(),
    }
}

fn to_ascii_json<T: Serialize>(value: &T) -> Option<String> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    value.serialize(&mut ser).ok()?;
    // The formatter only ever writes ASCII.
    String::from_utf8(buf).ok()
}

/// Compact JSON formatter that escapes everything outside printable ASCII.
#[derive(Debug, Clone, Copy, Default)]
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if is_safe_ascii(ch) {
                continue;
            }
            if start < idx {
                writer.write_all(&fragment.as_bytes()[start..idx])?;
            }
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        if start < fragment.len() {
            writer.write_all(&fragment.as_bytes()[start..])?;
        }
        Ok(())
    }
}

fn is_safe_ascii(ch: char) -> bool {
    matches!(ch, ' '..='~')
}

/// Whether `ch` is a pictographic glyph removed from file output.
pub fn is_pictograph(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1F600..=0x1F64F // emoticons
            | 0x1F300..=0x1F5FF // symbols and pictographs
            | 0x1F680..=0x1F6FF // transport and map
            | 0x1F1E0..=0x1F1FF // regional indicators (flags)
            | 0x1F900..=0x1F9FF // supplemental symbols and pictographs
            | 0x1FA70..=0x1FAFF // symbols and pictographs extended-A
            | 0x2600..=0x26FF // miscellaneous symbols
            | 0x2700..=0x27BF // dingbats
            | 0x2B50
            | 0x2B55
            | 0xFE0F // emoji presentation selector
            | 0x200D // zero width joiner
            | 0x20E3 // combining keycap
    )
}

/// Remove pictographs from `text`, borrowing when there is nothing to remove.
pub fn strip_pictographs(text: &str) -> Cow<'_, str> {
    if text.chars().any(is_pictograph) {
        Cow::Owned(text.chars().filter(|c| !is_pictograph(*c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExceptionRecord, Level, SourceLocation};
    use chrono::{DateTime, FixedOffset, TimeZone};

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 9, 8, 5, 7)
            .unwrap()
    }

    fn record(message: &str) -> LogRecord {
        LogRecord::new(ts(), Level::Info, "app.worker", message)
    }

    #[test]
    fn test_field_order_and_layout() {
        let rec = record("hello")
            .with_location(SourceLocation {
                file: "src/main.rs".to_string(),
                line: 12,
            })
            .with_args([Value::from(1), Value::from("a")]);
        assert_eq!(
            SafeJsonEncoder::new().encode(&rec),
            concat!(
                r#"{"timestamp":"2026-03-09T08:05:07.000-03:00","level":"INFO","#,
                r#""message":"hello","name":"app.worker","pathname":"src/main.rs","#,
                r#""lineno":12,"customargs":[1,"a"]}"#
            )
        );
    }

    #[test]
    fn test_emoji_is_removed_ascii_kept() {
        let line = SafeJsonEncoder::new().encode(&record("done ✅"));
        assert!(line.contains(r#""message":"done ""#), "{line}");
        assert!(!line.contains('✅'));
    }

    #[test]
    fn test_output_is_printable_ascii() {
        let rec = record("Usuário João 😊 logou 🇧🇷 às 10h 👨‍👩‍👧 ⭐\u{7f}\ttab")
            .with_args([Value::from("Empresa ABC 🏢"), Value::from("汉字𝄞")]);
        let line = SafeJsonEncoder::new().encode(&rec);
        assert!(line.bytes().all(|b| (0x20..0x7f).contains(&b)), "{line}");

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["message"], "Usuário João  logou  às 10h  \u{7f}\ttab");
        assert_eq!(parsed["customargs"][0], "Empresa ABC ");
        assert_eq!(parsed["customargs"][1], "汉字𝄞");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let rec = record("deploy 🚀 ok").with_args([Value::Float(f64::INFINITY)]);
        let encoder = SafeJsonEncoder::new();
        assert_eq!(encoder.encode(&rec), encoder.encode(&rec.clone()));
    }

    #[test]
    fn test_exception_fields_are_escaped() {
        let rec = record("boom").with_exception(ExceptionRecord {
            exc_type_name: "ParseIntError".to_string(),
            exc_message: "invalid digit ❌".to_string(),
            rendered_traceback: "ParseIntError: invalid digit\nat src/a.rs:1 in a::b".to_string(),
        });
        let line = SafeJsonEncoder::new().encode(&rec);
        assert!(!line.contains('\n'));
        assert!(line.ends_with(
            r#""customargs":[],"exc_name":"ParseIntError","exc_message":"invalid digit ","exc_info":"ParseIntError: invalid digit\nat src/a.rs:1 in a::b"}"#
        ));
    }

    #[test]
    fn test_missing_location_defaults() {
        let parsed: serde_json::Value =
            serde_json::from_str(&SafeJsonEncoder::new().encode(&record("x"))).unwrap();
        assert_eq!(parsed["pathname"], "");
        assert_eq!(parsed["lineno"], 0);
        assert!(parsed.get("exc_name").is_none());
    }

    #[test]
    fn test_non_finite_float_becomes_text() {
        let rec = record("x").with_args([f64::NAN, f64::NEG_INFINITY]);
        let line = SafeJsonEncoder::new().encode(&rec);
        assert!(line.contains(r#""customargs":["NaN","-inf"]"#), "{line}");
    }

    #[test]
    fn test_strip_pictographs_borrows_clean_text() {
        assert!(matches!(strip_pictographs("plain"), Cow::Borrowed("plain")));
        assert_eq!(strip_pictographs("a☀b✂c"), "abc");
    }
}
