use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Datetime, Text};
use history_core::{HistoryEvent, HistoryType, SourceTimezone, Ticket, UnknownHistoryType};

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::ticket)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct TicketRow {
    pub id: i64,
    pub tn: String,
    pub title: Option<String>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            number: row.tn,
            title: row.title,
        }
    }
}

/// One row of the joined history query (`ticket_history` + type name).
#[derive(QueryableByName, Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    #[diesel(sql_type = BigInt)]
    pub history_id: i64,
    #[diesel(sql_type = BigInt)]
    pub ticket_id: i64,
    #[diesel(sql_type = Datetime)]
    pub create_time: NaiveDateTime,
    #[diesel(sql_type = Datetime)]
    pub change_time: NaiveDateTime,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub history_type: String,
}

impl HistoryRow {
    /// Converts the row into a domain event, moving its wall-clock times to UTC.
    pub fn into_event(
        self,
        timezone: SourceTimezone,
    ) -> Result<HistoryEvent, UnknownHistoryType> {
        Ok(HistoryEvent {
            ticket_id: self.ticket_id,
            create_time: timezone.utc_from_local(self.create_time),
            change_time: timezone.utc_from_local(self.change_time),
            name: self.name,
            history_type: self.history_type.parse::<HistoryType>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use history_core::EnrichedDocument;

    fn row(history_type: &str) -> HistoryRow {
        let at = NaiveDate::from_ymd_opt(2017, 6, 9)
            .and_then(|date| date.and_hms_opt(12, 1, 25))
            .unwrap();
        HistoryRow {
            history_id: 9_001,
            ticket_id: 330804,
            create_time: at,
            change_time: at,
            name: "%%10330231%%".to_string(),
            history_type: history_type.to_string(),
        }
    }

    #[test]
    fn history_rows_map_onto_events() {
        let event = row("FollowUp").into_event(SourceTimezone::Utc).unwrap();
        assert_eq!(event.history_type, HistoryType::FollowUp);
        assert_eq!(event.ticket_id, 330804);
        assert_eq!(event.create_time, row("FollowUp").create_time);
    }

    #[test]
    fn non_utc_source_times_are_indexed_in_utc() {
        let berlin_summer = SourceTimezone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap());
        let event = row("FollowUp").into_event(berlin_summer).unwrap();
        let ticket = Ticket {
            id: 330804,
            number: "10330231".to_string(),
            title: None,
        };

        let document = serde_json::to_value(EnrichedDocument::new(&ticket, &event, 0, 0)).unwrap();

        assert_eq!(document["@timestamp"], "2017-06-09T10:01:25Z");
        assert_eq!(event.change_time, event.create_time);
    }

    #[test]
    fn unexpected_history_types_are_rejected() {
        assert_eq!(
            row("StateUpdate").into_event(SourceTimezone::Utc),
            Err(UnknownHistoryType("StateUpdate".to_string()))
        );
    }

    #[test]
    fn ticket_rows_map_onto_tickets() {
        let ticket = Ticket::from(TicketRow {
            id: 374514,
            tn: "10374514".to_string(),
            title: None,
        });
        assert_eq!(ticket.number, "10374514");
        assert_eq!(ticket.title, None);
    }
}
