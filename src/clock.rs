//! Time sources used to stamp records and pick rotation dates.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Default zone when `TIMEZONE` is unset.
pub const DEFAULT_TIMEZONE: &str = "-03:00";

const DEFAULT_OFFSET: FixedOffset = match FixedOffset::west_opt(3 * 3600) {
    Some(offset) => offset,
    None => panic!("invalid default offset"),
};

const UTC_OFFSET: FixedOffset = match FixedOffset::east_opt(0) {
    Some(offset) => offset,
    None => panic!("invalid utc offset"),
};

/// A source of "now" in the configured zone.
pub trait Clock: Send + Sync {
    /// Current instant with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// A configured time zone: either a fixed offset or an IANA zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneSpec {
    /// Fixed UTC offset, e.g. `-03:00`.
    Fixed(FixedOffset),
    /// IANA zone, e.g. `America/Sao_Paulo`.
    Named(Tz),
}

impl TimeZoneSpec {
    /// Convert a UTC instant into this zone.
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Fixed(offset) => instant.with_timezone(offset),
            Self::Named(tz) => instant.with_timezone(tz).fixed_offset(),
        }
    }
}

impl Default for TimeZoneSpec {
    fn default() -> Self {
        Self::Fixed(DEFAULT_OFFSET)
    }
}

impl FromStr for TimeZoneSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return Ok(Self::Fixed(UTC_OFFSET));
        }
        if s.starts_with('+') || s.starts_with('-') {
            return parse_offset(s).map(Self::Fixed);
        }
        s.parse::<Tz>()
            .map(Self::Named)
            .map_err(|e| Error::Config(format!("invalid timezone {s:?}: {e}")))
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(offset) => write!(f, "{offset}"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`.
fn parse_offset(s: &str) -> Result<FixedOffset> {
    let invalid = || Error::Config(format!("invalid UTC offset {s:?}"));
    let (sign, rest) = s.split_at(1);
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    let seconds = hours * 3600 + minutes * 60;
    let seconds = if sign == "-" { -seconds } else { seconds };
    FixedOffset::east_opt(seconds).ok_or_else(invalid)
}

/// The system clock viewed through a [`TimeZoneSpec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneClock {
    zone: TimeZoneSpec,
}

impl ZoneClock {
    /// Create a clock for `zone`.
    pub fn new(zone: TimeZoneSpec) -> Self {
        Self { zone }
    }

    /// The zone this clock reports in.
    pub fn zone(&self) -> TimeZoneSpec {
        self.zone
    }
}

impl Clock for ZoneClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.zone.localize(Utc::now())
    }
}

/// A clock that only moves when told to. Used to drive date rotation in tests
/// and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    /// Start at `start`.
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
