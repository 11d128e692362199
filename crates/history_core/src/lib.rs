pub mod timezone;
pub mod transform;
pub mod window;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use timezone::{InvalidTimezone, SourceTimezone};
pub use transform::{step, transform_ticket, StepOutcome, TicketRunState, TicketTransform};
pub use window::{parse_window_date, InvalidDate, RunWindow, SkipFilter, WindowError};

/// Ticket history classifications that survive the upstream filter.
///
/// Variant names match `ticket_history_type.name` in OTRS and are written to the index as-is.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryType {
    EmailCustomer,
    SendAnswer,
    FollowUp,
}

impl HistoryType {
    pub const ALL: [HistoryType; 3] = [
        HistoryType::EmailCustomer,
        HistoryType::SendAnswer,
        HistoryType::FollowUp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailCustomer => "EmailCustomer",
            Self::SendAnswer => "SendAnswer",
            Self::FollowUp => "FollowUp",
        }
    }
}

impl fmt::Display for HistoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown history type `{0}`")]
pub struct UnknownHistoryType(pub String);

impl FromStr for HistoryType {
    type Err = UnknownHistoryType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == raw)
            .ok_or_else(|| UnknownHistoryType(raw.to_string()))
    }
}

/// A support case as selected for one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    /// The user-visible ticket number (`tn`).
    pub number: String,
    pub title: Option<String>,
}

/// One row of ticket history after the channel/type filter.
///
/// Datetimes are UTC. The database stores them naive in its own zone; the source adapter
/// converts them with [`SourceTimezone`] before they get here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub ticket_id: i64,
    pub create_time: NaiveDateTime,
    pub change_time: NaiveDateTime,
    pub name: String,
    pub history_type: HistoryType,
}

/// Document written to the analytics index for every accepted history event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnrichedDocument {
    #[serde(rename = "@timestamp", with = "timestamp_seconds")]
    pub timestamp: DateTime<Utc>,
    pub history_type: HistoryType,
    pub ticket_nr: String,
    pub ticket_id: i64,
    pub iteration: u32,
    /// Seconds between the customer-side contact and this reply; 0 when not a reply.
    pub response_time: i64,
    /// Debug rendering of `response_time` as `HH:MM`, wrapped at 24 hours.
    pub response_time_in_hours: String,
}

impl EnrichedDocument {
    pub fn new(ticket: &Ticket, event: &HistoryEvent, iteration: u32, response_time: i64) -> Self {
        Self {
            timestamp: event.create_time.and_utc(),
            history_type: event.history_type,
            ticket_nr: ticket.number.clone(),
            ticket_id: event.ticket_id,
            iteration,
            response_time,
            response_time_in_hours: format_response_time(response_time),
        }
    }
}

/// Renders seconds as a wall-clock style `HH:MM`.
///
/// Only meant for eyeballing documents in the index. Durations past a day wrap around and
/// negative values wrap backwards from midnight.
pub fn format_response_time(seconds: i64) -> String {
    let within_day = seconds.rem_euclid(86_400);
    format!("{:02}:{:02}", within_day / 3_600, (within_day % 3_600) / 60)
}

mod timestamp_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
