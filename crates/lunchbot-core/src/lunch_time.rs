//! Time-of-day values used as lunch deadlines and dispatch buckets.
//!
//! A bucket is the hour and minute of a timezone-adjusted instant. Buckets are
//! compared by equality only: an organization is served by a dispatch tick
//! exactly when its configured lunch time equals the bucket computed for that
//! tick.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Hour and minute of the day, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LunchTime(u16);

impl LunchTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self((hour * 60 + minute) as u16))
    }

    /// Hour and minute of `dt`; seconds are dropped.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self((dt.hour() * 60 + dt.minute()) as u16)
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }

    /// Shift by a (possibly negative) duration, wrapping around midnight.
    pub fn shifted(self, by: Duration) -> Self {
        let day = i64::from(MINUTES_PER_DAY);
        let m = (i64::from(self.0) + by.num_minutes()).rem_euclid(day);
        Self(m as u16)
    }
}

impl fmt::Display for LunchTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LunchTimeError {
    /// Not of the form `H:M` with two numeric parts.
    Malformed(String),
    HourOutOfRange(u32),
    MinuteOutOfRange(u32),
}

impl fmt::Display for LunchTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LunchTimeError::Malformed(s) => write!(f, "'{s}' is not a time like 12:30"),
            LunchTimeError::HourOutOfRange(h) => write!(f, "hour {h} is greater than 23"),
            LunchTimeError::MinuteOutOfRange(m) => write!(f, "minute {m} is greater than 59"),
        }
    }
}

impl std::error::Error for LunchTimeError {}

impl FromStr for LunchTime {
    type Err = LunchTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LunchTimeError::Malformed(s.to_string());
        let mut parts = s.trim().split(':');
        let (Some(h), Some(m), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        let hour: u32 = h.parse().map_err(|_| malformed())?;
        let minute: u32 = m.parse().map_err(|_| malformed())?;
        if hour > 23 {
            return Err(LunchTimeError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(LunchTimeError::MinuteOutOfRange(minute));
        }
        Ok(Self((hour * 60 + minute) as u16))
    }
}

impl TryFrom<String> for LunchTime {
    type Error = LunchTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LunchTime> for String {
    fn from(value: LunchTime) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Local time and bucket arithmetic
// ---------------------------------------------------------------------------

/// Wall-clock time in the bot's configured timezone.
pub fn local_now(now_utc: DateTime<Utc>, timezone_offset: Duration) -> NaiveDateTime {
    (now_utc + timezone_offset).naive_utc()
}

pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// The lunch time an organization must have for its orders to ship now.
pub fn shipment_bucket(now_local: NaiveDateTime, ship_offset: Duration) -> LunchTime {
    LunchTime::from_datetime(&(truncate_to_minute(now_local) + ship_offset))
}

/// Latest lunch time whose orders may still change today. `None` once
/// `now + ship_offset` falls on the next day: every lunch of today has
/// shipped by then. Unlike the dispatch buckets this does not wrap.
pub fn change_cutoff(now_local: NaiveDateTime, ship_offset: Duration) -> Option<LunchTime> {
    let shifted = truncate_to_minute(now_local) + ship_offset;
    (shifted.date() == now_local.date()).then(|| LunchTime::from_datetime(&shifted))
}

/// Lunch times whose users get the first and second reminder now.
pub fn reminder_buckets(
    now_local: NaiveDateTime,
    ship_offset: Duration,
    first: Duration,
    second: Duration,
) -> (LunchTime, LunchTime) {
    let base = truncate_to_minute(now_local) + ship_offset;
    (
        LunchTime::from_datetime(&(base + first)),
        LunchTime::from_datetime(&(base + second)),
    )
}
