use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Default size cap for a single log file (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Parse a size string with optional units (B/K/M/G, case-insensitive), defaulting to KB if no unit.
pub(crate) fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err("empty size string".to_string());
    };

    let (num_str, unit) = if last.is_alphabetic() {
        (&s[..s.len() - last.len_utf8()], last.to_ascii_uppercase())
    } else {
        (s, 'K') // Default to KB
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier = match unit {
        'B' => 1,
        'K' => 1024,
        'M' => 1024 * 1024,
        'G' => 1024 * 1024 * 1024,
        _ => return Err(format!("invalid unit: {}, supported: B/K/M/G", unit)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number or string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

impl SizeValue {
    fn to_bytes(&self) -> Result<u64, String> {
        match self {
            SizeValue::Number(n) => parse_size(&n.to_string()),
            SizeValue::String(s) => parse_size(s),
        }
    }
}

/// Why the current file is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// No file is open for the stream yet.
    NoCurrentFile,
    /// The next line would push the file past its size cap.
    SizeExceeded,
    /// The calendar date moved on since the file was opened.
    DateChanged,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCurrentFile => "no current file",
            Self::SizeExceeded => "size exceeded",
            Self::DateChanged => "date changed",
        })
    }
}

/// What the engine knows about the open file when deciding to rotate.
#[derive(Debug, Clone, Copy)]
pub struct FileSnapshot {
    /// Bytes written since the file was opened.
    pub bytes: u64,
    /// Date the file belongs to.
    pub date: NaiveDate,
}

/// When to replace the current log file.
///
/// Files always rotate when the date changes; `max_file_size` adds a size
/// trigger. In configuration files the size accepts a number (KB) or a string
/// with units (`"512K"`, `"10M"`, `"1G"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size cap in bytes; `None` disables size rotation.
    pub max_file_size: Option<u64>,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
        }
    }
}

impl RotationPolicy {
    /// Rotate on date change and when a file would exceed `max_size` bytes.
    pub fn size(max_size: u64) -> Self {
        Self {
            max_file_size: Some(max_size),
        }
    }

    /// Rotate on date change only.
    pub fn daily() -> Self {
        Self {
            max_file_size: None,
        }
    }

    /// Check if rotation is needed before appending `incoming` bytes on `today`.
    pub fn evaluate(
        &self,
        current: Option<FileSnapshot>,
        today: NaiveDate,
        incoming: usize,
    ) -> Option<RotationReason> {
        let Some(state) = current else {
            return Some(RotationReason::NoCurrentFile);
        };
        if state.date != today {
            return Some(RotationReason::DateChanged);
        }
        match self.max_file_size {
            // An empty file always takes the line, however long.
            Some(max) if state.bytes > 0 && state.bytes + incoming as u64 > max => {
                Some(RotationReason::SizeExceeded)
            }
            _ => None,
        }
    }
}

/// Render a byte count in the largest unit that divides it exactly.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [(u64, char); 3] = [(1024 * 1024 * 1024, 'G'), (1024 * 1024, 'M'), (1024, 'K')];
    for (factor, unit) in UNITS {
        if bytes >= factor && bytes % factor == 0 {
            return format!("{}{}", bytes / factor, unit);
        }
    }
    format!("{bytes}B")
}

pub(crate) fn serialize_size<S: Serializer>(
    size: &Option<u64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    size.map(format_size).serialize(serializer)
}

/// Deserialize an optional size given as bytes-in-KB number or unit string.
pub(crate) fn deserialize_size<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    let value = Option::<SizeValue>::deserialize(deserializer)?;
    value
        .map(|v| v.to_bytes().map_err(de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("10"), Ok(10 * 1024));
        assert_eq!(parse_size("5K"), Ok(5 * 1024));
        assert_eq!(parse_size("2m"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("1G"), Ok(1024 * 1024 * 1024));
        assert_eq!(parse_size("100b"), Ok(100));
        assert!(parse_size("").is_err());
        assert!(parse_size("5X").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("99999999999999999G").is_err());
    }

    #[test]
    fn test_format_size_round_trips() {
        for bytes in [100, 1024, 3 * 1024 * 1024, 1536, DEFAULT_MAX_FILE_SIZE] {
            assert_eq!(parse_size(&format_size(bytes)), Ok(bytes));
        }
        assert_eq!(format_size(DEFAULT_MAX_FILE_SIZE), "10M");
    }

    #[test]
    fn test_no_current_file_rotates() {
        let policy = RotationPolicy::default();
        assert_eq!(
            policy.evaluate(None, day(9), 0),
            Some(RotationReason::NoCurrentFile)
        );
    }

    #[test]
    fn test_date_change_rotates() {
        let policy = RotationPolicy::daily();
        let snapshot = FileSnapshot {
            bytes: 10,
            date: day(9),
        };
        assert_eq!(policy.evaluate(Some(snapshot), day(9), 5), None);
        assert_eq!(
            policy.evaluate(Some(snapshot), day(10), 5),
            Some(RotationReason::DateChanged)
        );
    }

    #[test]
    fn test_size_rotates_before_overflow() {
        let policy = RotationPolicy::size(100);
        let snapshot = FileSnapshot {
            bytes: 90,
            date: day(9),
        };
        assert_eq!(policy.evaluate(Some(snapshot), day(9), 10), None);
        assert_eq!(
            policy.evaluate(Some(snapshot), day(9), 11),
            Some(RotationReason::SizeExceeded)
        );
    }

    #[test]
    fn test_empty_file_accepts_oversized_line() {
        let policy = RotationPolicy::size(1);
        let snapshot = FileSnapshot {
            bytes: 0,
            date: day(9),
        };
        assert_eq!(policy.evaluate(Some(snapshot), day(9), 500), None);
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_size")]
        max_file_size: Option<u64>,
    }

    #[test]
    fn test_deserialize_size_values() {
        let holder: Holder = serde_yaml::from_str("max_file_size: 10").unwrap();
        assert_eq!(holder.max_file_size, Some(10 * 1024));

        let holder: Holder = serde_yaml::from_str("max_file_size: \"3m\"").unwrap();
        assert_eq!(holder.max_file_size, Some(3 * 1024 * 1024));

        let holder: Holder = serde_yaml::from_str("max_file_size: null").unwrap();
        assert_eq!(holder.max_file_size, None);

        let holder: Holder = serde_yaml::from_str("{}").unwrap();
        assert_eq!(holder.max_file_size, None);

        assert!(serde_yaml::from_str::<Holder>("max_file_size: \"5X\"").is_err());
    }
}
