use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::timezone::SourceTimezone;
use crate::HistoryEvent;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not parse `{0}` as a calendar date or date/time")]
pub struct InvalidDate(pub String);

/// Parses the start of a run window into UTC.
///
/// Accepts a bare date (midnight), a date with minutes or seconds using either a space or `T`
/// separator, and RFC 3339 with an explicit offset. Values without an offset are wall-clock
/// times in `timezone`, the zone the helpdesk records its own times in.
pub fn parse_window_date(
    raw: &str,
    timezone: SourceTimezone,
) -> Result<NaiveDateTime, InvalidDate> {
    let trimmed = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|local| timezone.utc_from_local(local))
        .ok_or_else(|| InvalidDate(raw.to_string()))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("either a start date or a ticket number is required")]
    MissingSelector,

    #[error("a start date and a ticket number cannot be combined")]
    ConflictingSelectors,

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),
}

/// Which part of the index a run owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWindow {
    /// Follow-up import: events changed at or after `from` were handled by an earlier run.
    Incremental { from: NaiveDateTime },
    /// Full import from `from`; every event is re-emitted.
    Initial { from: NaiveDateTime },
    /// Re-import of one ticket without touching the rest of the index.
    SingleTicket { number: String },
}

impl RunWindow {
    /// Builds the window from the two mutually exclusive selectors.
    ///
    /// Blank selectors count as absent. `initial` only matters for date windows.
    pub fn from_selectors(
        date: Option<&str>,
        ticket_number: Option<&str>,
        initial: bool,
        timezone: SourceTimezone,
    ) -> Result<Self, WindowError> {
        let date = date.map(str::trim).filter(|value| !value.is_empty());
        let ticket_number = ticket_number
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match (date, ticket_number) {
            (Some(_), Some(_)) => Err(WindowError::ConflictingSelectors),
            (None, None) => Err(WindowError::MissingSelector),
            (None, Some(number)) => Ok(Self::SingleTicket {
                number: number.to_string(),
            }),
            (Some(raw), None) => {
                let from = parse_window_date(raw, timezone)?;
                if initial {
                    Ok(Self::Initial { from })
                } else {
                    Ok(Self::Incremental { from })
                }
            }
        }
    }

    /// Start of the index range that is cleared before the run, if any.
    pub fn reset_from(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Incremental { from } | Self::Initial { from } => Some(*from),
            Self::SingleTicket { .. } => None,
        }
    }

    pub fn skip_filter(&self) -> SkipFilter {
        match self {
            Self::Incremental { from } => SkipFilter::ChangedSince(*from),
            Self::Initial { .. } | Self::SingleTicket { .. } => SkipFilter::Disabled,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Incremental { .. } => "incremental",
            Self::Initial { .. } => "initial",
            Self::SingleTicket { .. } => "single_ticket",
        }
    }
}

/// Decides whether a history row was already handled by a previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipFilter {
    Disabled,
    ChangedSince(NaiveDateTime),
}

impl SkipFilter {
    pub fn skips(&self, event: &HistoryEvent) -> bool {
        match self {
            Self::Disabled => false,
            Self::ChangedSince(cutoff) => event.change_time >= *cutoff,
        }
    }
}
