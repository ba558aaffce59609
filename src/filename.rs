//! Canonical log filenames.
//!
//! Every rotating file is named after its identifier tuple:
//!
//! ```text
//! {robot_id}_{part}_{YYYYMMDD}_{HHMMSS}_{round_id}.log
//! ```
//!
//! Decoding is strict so that directory scans can tell our files apart from
//! anything else living under the log root.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::MalformedFilenameError;

const EXTENSION: &str = ".log";
const DATE_FORMAT: &str = "%Y%m%d";
const TIME_FORMAT: &str = "%H%M%S";

/// The identifier tuple encoded into a log filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentifier {
    /// Robot (process) identifier. Must not contain `_`.
    pub robot_id: String,
    /// Sequence number within one (robot_id, date) pair.
    pub part: u32,
    /// Calendar date the file was opened on.
    pub date: NaiveDate,
    /// Wall-clock time the file was opened at, second precision.
    pub time: NaiveTime,
    /// Round (run) identifier. Must not contain `_`.
    pub round_id: String,
}

impl FileIdentifier {
    /// Build an identifier. Sub-second precision of `time` is dropped.
    pub fn new(
        robot_id: impl Into<String>,
        part: u32,
        date: NaiveDate,
        time: NaiveTime,
        round_id: impl Into<String>,
    ) -> Self {
        Self {
            robot_id: robot_id.into(),
            part,
            date,
            time: time.with_nanosecond(0).unwrap_or(time),
            round_id: round_id.into(),
        }
    }

    /// Render the canonical filename.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a canonical filename.
    pub fn decode(name: &str) -> Result<Self, MalformedFilenameError> {
        let stem = name
            .strip_suffix(EXTENSION)
            .ok_or_else(|| MalformedFilenameError::new(name, "missing .log extension"))?;

        let fields: Vec<&str> = stem.split('_').collect();
        let [robot_id, part, date, time, round_id] = fields.as_slice() else {
            return Err(MalformedFilenameError::new(name, "expected 5 fields"));
        };

        if robot_id.is_empty() {
            return Err(MalformedFilenameError::new(name, "empty robot id"));
        }
        if round_id.is_empty() {
            return Err(MalformedFilenameError::new(name, "empty round id"));
        }
        if part.is_empty() || !is_digits(part) {
            return Err(MalformedFilenameError::new(name, "part is not a number"));
        }
        let part: u32 = part
            .parse()
            .map_err(|_| MalformedFilenameError::new(name, "part out of range"))?;

        if date.len() != 8 || !is_digits(date) {
            return Err(MalformedFilenameError::new(name, "date must be YYYYMMDD"));
        }
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| MalformedFilenameError::new(name, "invalid date"))?;

        if time.len() != 6 || !is_digits(time) {
            return Err(MalformedFilenameError::new(name, "time must be HHMMSS"));
        }
        let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|_| MalformedFilenameError::new(name, "invalid time"))?;

        Ok(Self::new(*robot_id, part, date, time, *round_id))
    }

    /// Decode the final component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, MalformedFilenameError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MalformedFilenameError::new(&path.to_string_lossy(), "not a file name"))?;
        Self::decode(name)
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for FileIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{:02}_{}_{}_{}{}",
            self.robot_id,
            self.part,
            self.date.format(DATE_FORMAT),
            self.time.format(TIME_FORMAT),
            self.round_id,
            EXTENSION
        )
    }
}

impl FromStr for FileIdentifier {
    type Err = MalformedFilenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

// Listing and retention order: oldest first.
impl Ord for FileIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.time.cmp(&other.time))
            .then_with(|| self.part.cmp(&other.part))
            .then_with(|| self.round_id.cmp(&other.round_id))
            .then_with(|| self.robot_id.cmp(&other.robot_id))
    }
}

impl PartialOrd for FileIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
