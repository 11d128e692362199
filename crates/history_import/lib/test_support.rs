use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use futures::future::BoxFuture;
use history_core::{EnrichedDocument, HistoryEvent, HistoryType, Ticket};

use crate::elastic::bulk::{BulkItemFailure, BulkOutcome};
use crate::elastic::{IndexError, SearchIndex};
use crate::source::{HistorySource, SourceError};

pub(crate) fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 6, 9)
        .and_then(|date| date.and_hms_opt(8, 0, 0))
        .expect("valid base time")
}

pub(crate) fn at_minute(minutes: i64) -> NaiveDateTime {
    base_time() + Duration::minutes(minutes)
}

pub(crate) fn sample_ticket(id: i64) -> Ticket {
    Ticket {
        id,
        number: format!("1033{id:04}"),
        title: Some(format!("ticket {id}")),
    }
}

/// Event created and last changed at `minutes` past [`base_time`].
pub(crate) fn sample_event(ticket_id: i64, history_type: HistoryType, minutes: i64) -> HistoryEvent {
    HistoryEvent {
        ticket_id,
        create_time: at_minute(minutes),
        change_time: at_minute(minutes),
        name: format!("{history_type} at +{minutes}m"),
        history_type,
    }
}

pub(crate) fn sample_document(ticket_id: i64, iteration: u32) -> EnrichedDocument {
    EnrichedDocument::new(
        &sample_ticket(ticket_id),
        &sample_event(ticket_id, HistoryType::FollowUp, i64::from(iteration)),
        iteration,
        0,
    )
}

fn database_error(message: &str) -> DieselError {
    DieselError::DatabaseError(DatabaseErrorKind::Unknown, Box::new(message.to_string()))
}

/// Collects formatted log output for the current thread while the guard lives.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        let buffer = self.buffer.lock().expect("log buffer mutex poisoned");
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("log buffer mutex poisoned")
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockSource {
    tickets: Vec<Ticket>,
    history: HashMap<i64, Vec<HistoryEvent>>,
    failing_history: HashSet<i64>,
    fail_selection: bool,
    selections: Mutex<Vec<NaiveDateTime>>,
    history_calls: Mutex<Vec<i64>>,
}

impl MockSource {
    pub(crate) fn with_ticket(mut self, ticket: Ticket, events: Vec<HistoryEvent>) -> Self {
        self.history.insert(ticket.id, events);
        self.tickets.push(ticket);
        self
    }

    pub(crate) fn with_failing_history(mut self, ticket: Ticket) -> Self {
        self.failing_history.insert(ticket.id);
        self.tickets.push(ticket);
        self
    }

    pub(crate) fn failing_selection(mut self) -> Self {
        self.fail_selection = true;
        self
    }

    pub(crate) fn selections(&self) -> Vec<NaiveDateTime> {
        self.selections.lock().expect("selections mutex poisoned").clone()
    }

    pub(crate) fn history_calls(&self) -> Vec<i64> {
        self.history_calls
            .lock()
            .expect("history_calls mutex poisoned")
            .clone()
    }
}

impl HistorySource for MockSource {
    fn tickets_changed_after<'a>(
        &'a self,
        from: NaiveDateTime,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, SourceError>> {
        Box::pin(async move {
            self.selections
                .lock()
                .expect("selections mutex poisoned")
                .push(from);
            if self.fail_selection {
                return Err(SourceError::Query(database_error("server has gone away")));
            }
            Ok(self.tickets.clone())
        })
    }

    fn ticket_by_number<'a>(
        &'a self,
        number: &'a str,
    ) -> BoxFuture<'a, Result<Option<Ticket>, SourceError>> {
        Box::pin(async move {
            if self.fail_selection {
                return Err(SourceError::Query(database_error("server has gone away")));
            }
            Ok(self
                .tickets
                .iter()
                .find(|ticket| ticket.number == number)
                .cloned())
        })
    }

    fn history_for_ticket<'a>(
        &'a self,
        ticket_id: i64,
    ) -> BoxFuture<'a, Result<Vec<HistoryEvent>, SourceError>> {
        Box::pin(async move {
            self.history_calls
                .lock()
                .expect("history_calls mutex poisoned")
                .push(ticket_id);
            if self.failing_history.contains(&ticket_id) {
                return Err(SourceError::Query(database_error("lost connection to MySQL")));
            }
            Ok(self.history.get(&ticket_id).cloned().unwrap_or_default())
        })
    }
}

/// Scripted response for one bulk call; unscripted calls accept everything.
pub(crate) enum BulkScript {
    Accept,
    RejectPositions(Vec<usize>),
    Fail,
}

#[derive(Default)]
pub(crate) struct MockIndex {
    deleted: u64,
    fail_delete: bool,
    bulk_plan: Mutex<VecDeque<BulkScript>>,
    bulk_calls: Mutex<Vec<Vec<EnrichedDocument>>>,
    delete_calls: Mutex<Vec<DateTime<Utc>>>,
}

impl MockIndex {
    pub(crate) fn with_deleted(mut self, deleted: u64) -> Self {
        self.deleted = deleted;
        self
    }

    pub(crate) fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub(crate) fn with_bulk_plan(self, plan: Vec<BulkScript>) -> Self {
        *self.bulk_plan.lock().expect("bulk_plan mutex poisoned") = plan.into();
        self
    }

    pub(crate) fn bulk_calls(&self) -> Vec<Vec<EnrichedDocument>> {
        self.bulk_calls
            .lock()
            .expect("bulk_calls mutex poisoned")
            .clone()
    }

    pub(crate) fn written(&self) -> Vec<EnrichedDocument> {
        self.bulk_calls().into_iter().flatten().collect()
    }

    pub(crate) fn delete_calls(&self) -> Vec<DateTime<Utc>> {
        self.delete_calls
            .lock()
            .expect("delete_calls mutex poisoned")
            .clone()
    }
}

impl SearchIndex for MockIndex {
    fn delete_from<'a>(&'a self, from: DateTime<Utc>) -> BoxFuture<'a, Result<u64, IndexError>> {
        Box::pin(async move {
            self.delete_calls
                .lock()
                .expect("delete_calls mutex poisoned")
                .push(from);
            if self.fail_delete {
                return Err(IndexError::UnexpectedStatus {
                    operation: "delete_by_query",
                    status: 503,
                    body: "cluster unavailable".to_string(),
                });
            }
            Ok(self.deleted)
        })
    }

    fn bulk<'a>(
        &'a self,
        documents: &'a [EnrichedDocument],
    ) -> BoxFuture<'a, Result<BulkOutcome, IndexError>> {
        Box::pin(async move {
            self.bulk_calls
                .lock()
                .expect("bulk_calls mutex poisoned")
                .push(documents.to_vec());
            let script = self
                .bulk_plan
                .lock()
                .expect("bulk_plan mutex poisoned")
                .pop_front()
                .unwrap_or(BulkScript::Accept);

            match script {
                BulkScript::Accept => Ok(BulkOutcome {
                    indexed: documents.len(),
                    failures: Vec::new(),
                }),
                BulkScript::RejectPositions(positions) => Ok(BulkOutcome {
                    indexed: documents.len().saturating_sub(positions.len()),
                    failures: positions
                        .into_iter()
                        .map(|position| BulkItemFailure {
                            position,
                            status: 400,
                            reason: "mapper_parsing_exception: failed to parse".to_string(),
                        })
                        .collect(),
                }),
                BulkScript::Fail => Err(IndexError::UnexpectedStatus {
                    operation: "bulk",
                    status: 503,
                    body: "cluster unavailable".to_string(),
                }),
            }
        })
    }
}
