pub mod error;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel_async::{AsyncMysqlConnection, RunQueryDsl};
use futures::future::BoxFuture;
use history_core::{HistoryEvent, SourceTimezone, Ticket};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::models::{HistoryRow, TicketRow};
use crate::db::schema::ticket;
pub use error::SourceError;

/// Read side of the helpdesk database.
///
/// Abstracted so the import run can be exercised without a MySQL instance.
pub trait HistorySource: Send + Sync {
    /// Tickets whose last change is strictly after `from` (UTC), by id.
    fn tickets_changed_after<'a>(
        &'a self,
        from: NaiveDateTime,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, SourceError>>;

    fn ticket_by_number<'a>(
        &'a self,
        number: &'a str,
    ) -> BoxFuture<'a, Result<Option<Ticket>, SourceError>>;

    /// External-email history of one ticket, restricted to the three tracked types and ordered
    /// by creation time.
    fn history_for_ticket<'a>(
        &'a self,
        ticket_id: i64,
    ) -> BoxFuture<'a, Result<Vec<HistoryEvent>, SourceError>>;
}

impl<T> HistorySource for Arc<T>
where
    T: HistorySource + ?Sized,
{
    fn tickets_changed_after<'a>(
        &'a self,
        from: NaiveDateTime,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, SourceError>> {
        (**self).tickets_changed_after(from)
    }

    fn ticket_by_number<'a>(
        &'a self,
        number: &'a str,
    ) -> BoxFuture<'a, Result<Option<Ticket>, SourceError>> {
        (**self).ticket_by_number(number)
    }

    fn history_for_ticket<'a>(
        &'a self,
        ticket_id: i64,
    ) -> BoxFuture<'a, Result<Vec<HistoryEvent>, SourceError>> {
        (**self).history_for_ticket(ticket_id)
    }
}

const HISTORY_SELECT: &str = "
    SELECT      th.id AS history_id,
                th.ticket_id,
                th.create_time,
                th.change_time,
                th.name,
                tht.name AS history_type
    FROM        ticket_history th
    INNER JOIN  ticket_history_type tht ON th.history_type_id = tht.id
    LEFT JOIN   article a ON th.article_id = a.id
    LEFT JOIN   article_type art ON art.id = a.article_type_id
    WHERE       th.ticket_id = ?
    AND         tht.name IN ('EmailCustomer', 'SendAnswer', 'FollowUp')
    AND         art.name = 'email-external'";

// Customer follow-ups that OTRS logs together with an automatic "response required" state
// change share its change_time and are not real contacts.
const AUTOMATED_FOLLOWUP_EXCLUSION: &str = "
    AND         th.change_time NOT IN (
                    SELECT  sys.change_time
                    FROM    ticket_history sys
                    WHERE   sys.ticket_id = ?
                    AND     sys.change_by = 1
                    AND     (sys.name LIKE '%customer response required%'
                             OR sys.name LIKE '%internal response required%')
                )";

const HISTORY_ORDER: &str = "
    ORDER BY    th.create_time, th.id";

/// History query text, built once per run and reused for every ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    sql: String,
    exclude_automated_followups: bool,
}

impl HistoryQuery {
    pub fn new(exclude_automated_followups: bool) -> Self {
        let mut sql = String::from(HISTORY_SELECT);
        if exclude_automated_followups {
            sql.push_str(AUTOMATED_FOLLOWUP_EXCLUSION);
        }
        sql.push_str(HISTORY_ORDER);
        Self {
            sql,
            exclude_automated_followups,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders; every one of them binds the ticket id.
    #[cfg(test)]
    fn bind_count(&self) -> usize {
        if self.exclude_automated_followups {
            2
        } else {
            1
        }
    }
}

/// MySQL-backed source holding the run's one connection.
///
/// Datetimes cross this boundary in UTC; `timezone` maps them to and from the database's
/// naive columns.
pub struct MysqlHistorySource {
    conn: Mutex<AsyncMysqlConnection>,
    history_query: HistoryQuery,
    timezone: SourceTimezone,
}

impl MysqlHistorySource {
    pub fn new(
        conn: AsyncMysqlConnection,
        history_query: HistoryQuery,
        timezone: SourceTimezone,
    ) -> Self {
        Self {
            conn: Mutex::new(conn),
            history_query,
            timezone,
        }
    }

    async fn load_history(&self, ticket_id: i64) -> Result<Vec<HistoryEvent>, SourceError> {
        let mut conn = self.conn.lock().await;
        let query = sql_query(self.history_query.sql()).bind::<BigInt, _>(ticket_id);

        let rows: Vec<HistoryRow> = if self.history_query.exclude_automated_followups {
            query
                .bind::<BigInt, _>(ticket_id)
                .load(&mut *conn)
                .await?
        } else {
            query.load(&mut *conn).await?
        };

        rows.into_iter()
            .map(|row| {
                let history_id = row.history_id;
                row.into_event(self.timezone)
                    .map_err(|source| SourceError::UnknownHistoryType { history_id, source })
            })
            .collect()
    }
}

impl HistorySource for MysqlHistorySource {
    fn tickets_changed_after<'a>(
        &'a self,
        from: NaiveDateTime,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, SourceError>> {
        Box::pin(async move {
            let from = self.timezone.local_from_utc(from);
            let mut conn = self.conn.lock().await;
            let rows: Vec<TicketRow> = ticket::table
                .filter(ticket::change_time.gt(from))
                .order(ticket::id)
                .select(TicketRow::as_select())
                .load(&mut *conn)
                .await?;
            Ok(rows.into_iter().map(Ticket::from).collect())
        })
    }

    fn ticket_by_number<'a>(
        &'a self,
        number: &'a str,
    ) -> BoxFuture<'a, Result<Option<Ticket>, SourceError>> {
        Box::pin(async move {
            let mut conn = self.conn.lock().await;
            let row: Option<TicketRow> = ticket::table
                .filter(ticket::tn.eq(number))
                .select(TicketRow::as_select())
                .first(&mut *conn)
                .await
                .optional()?;
            Ok(row.map(Ticket::from))
        })
    }

    fn history_for_ticket<'a>(
        &'a self,
        ticket_id: i64,
    ) -> BoxFuture<'a, Result<Vec<HistoryEvent>, SourceError>> {
        Box::pin(self.load_history(ticket_id))
    }
}
