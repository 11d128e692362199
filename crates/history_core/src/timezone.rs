use std::fmt;
use std::str::FromStr;

use chrono::{Duration, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported timezone `{0}`, expected `local`, `UTC` or an offset such as `+02:00`")]
pub struct InvalidTimezone(pub String);

/// Zone the helpdesk database writes its naive `DATETIME` columns in.
///
/// Naive source times are converted to UTC when they enter the importer; everything past the
/// source boundary works on UTC wall-clock values.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String")]
pub enum SourceTimezone {
    /// The zone of the host running the import (honours `TZ`).
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl SourceTimezone {
    /// Converts a wall-clock time in this zone to UTC.
    ///
    /// Times repeated by a DST fall-back resolve to the earlier instant; times skipped by a
    /// spring-forward are moved one hour later.
    pub fn utc_from_local(self, local: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Utc => local,
            Self::Fixed(offset) => local - Duration::seconds(i64::from(offset.local_minus_utc())),
            Self::Local => Local
                .from_local_datetime(&local)
                .earliest()
                .or_else(|| {
                    Local
                        .from_local_datetime(&(local + Duration::hours(1)))
                        .earliest()
                })
                .map_or(local, |resolved| resolved.naive_utc()),
        }
    }

    /// Converts a UTC time back to wall-clock time in this zone, for querying the source.
    pub fn local_from_utc(self, utc: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Utc => utc,
            Self::Fixed(offset) => utc + Duration::seconds(i64::from(offset.local_minus_utc())),
            Self::Local => Local.from_utc_datetime(&utc).naive_local(),
        }
    }
}

impl FromStr for SourceTimezone {
    type Err = InvalidTimezone;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(Self::Local),
            "utc" | "z" => return Ok(Self::Utc),
            _ => {}
        }
        parse_offset(trimmed)
            .map(Self::Fixed)
            .ok_or_else(|| InvalidTimezone(raw.to_string()))
    }
}

impl TryFrom<String> for SourceTimezone {
    type Error = InvalidTimezone;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl fmt::Display for SourceTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("UTC"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// `+HH`, `+HHMM` or `+HH:MM` (and the `-` forms).
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, digits) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits = digits.replacen(':', "", 1);
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
