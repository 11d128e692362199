pub mod error;


use std::time::Instant;

use history_core::{transform_ticket, EnrichedDocument, RunWindow, Ticket};
use tracing::{debug, info, warn};

use crate::elastic::SearchIndex;
use crate::source::{HistorySource, SourceError};
use crate::window::reset_window;
use crate::writer::{BatchPolicy, BatchWriter, WriterStats};
pub use error::ImportError;

/// Totals for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub tickets_selected: usize,
    pub tickets_with_history: usize,
    pub documents_emitted: usize,
    pub events_skipped: usize,
    pub answers_suppressed: usize,
    pub documents_written: usize,
    pub documents_failed: usize,
    pub batches_flushed: usize,
    /// `None` when the run did not touch the index window (single-ticket runs).
    pub deleted_in_window: Option<u64>,
    pub no_tickets: bool,
}

impl RunSummary {
    fn record_writes(&mut self, stats: WriterStats) {
        self.documents_written = stats.documents_written;
        self.documents_failed = stats.documents_failed;
        self.batches_flushed = stats.batches_flushed;
    }
}

/// Drives one run: window reset, ticket selection, per-ticket transform and bulk writes.
///
/// Everything is awaited in sequence, one ticket and one event at a time.
pub struct ImportService<S, I> {
    source: S,
    index: I,
    batch_policy: BatchPolicy,
}

impl<S, I> ImportService<S, I>
where
    S: HistorySource,
    I: SearchIndex,
{
    pub fn new(source: S, index: I, batch_policy: BatchPolicy) -> Self {
        Self {
            source,
            index,
            batch_policy,
        }
    }

    /// Tickets a run covers: changed after the window start, or the one named ticket.
    pub async fn select_tickets(&self, window: &RunWindow) -> Result<Vec<Ticket>, SourceError> {
        match window {
            RunWindow::Incremental { from } | RunWindow::Initial { from } => {
                self.source.tickets_changed_after(*from).await
            }
            RunWindow::SingleTicket { number } => Ok(self
                .source
                .ticket_by_number(number)
                .await?
                .into_iter()
                .collect()),
        }
    }

    pub async fn run(&self, window: &RunWindow) -> Result<RunSummary, ImportError> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        info!(
            event = "import_starting",
            mode = window.mode(),
            batch_max_lines = self.batch_policy.max_lines,
            "starting import run"
        );

        if let Some(from) = window.reset_from() {
            let deleted = reset_window(&self.index, from)
                .await
                .map_err(ImportError::WindowReset)?;
            summary.deleted_in_window = Some(deleted);
        }

        let tickets = self
            .select_tickets(window)
            .await
            .map_err(ImportError::Selection)?;
        summary.tickets_selected = tickets.len();

        if tickets.is_empty() {
            warn!(
                event = "import_no_tickets",
                mode = window.mode(),
                "no tickets found"
            );
            summary.no_tickets = true;
            log_summary(window, &summary, started);
            return Ok(summary);
        }

        let filter = window.skip_filter();
        let mut writer = BatchWriter::new(&self.index, self.batch_policy);

        for ticket in &tickets {
            info!(
                event = "ticket_import_started",
                ticket_id = ticket.id,
                ticket_nr = %ticket.number,
                title = ticket.title.as_deref().unwrap_or_default(),
                "start import ticket"
            );

            let events = match self.source.history_for_ticket(ticket.id).await {
                Ok(events) => events,
                Err(source) => {
                    // Tickets already transformed are complete; keep them.
                    summary.record_writes(writer.finish().await);
                    return Err(ImportError::QueryExecution {
                        ticket_id: ticket.id,
                        source,
                    });
                }
            };

            if events.is_empty() {
                debug!(
                    event = "ticket_history_empty",
                    ticket_id = ticket.id,
                    ticket_nr = %ticket.number,
                    "no history for ticket"
                );
                continue;
            }
            summary.tickets_with_history += 1;

            let transform = transform_ticket(ticket, events, filter);
            summary.events_skipped += transform.skipped.len();
            for skipped in &transform.skipped {
                debug!(
                    event = "history_event_skipped",
                    ticket_id = ticket.id,
                    ticket_nr = %ticket.number,
                    history_type = %skipped.history_type,
                    change_time = %skipped.change_time,
                    "skip event already imported"
                );
            }
            summary.answers_suppressed += transform.suppressed;
            summary.documents_emitted += transform.documents.len();

            for document in transform.documents {
                log_document(&document);
                writer.push(document).await;
            }
        }

        summary.record_writes(writer.finish().await);
        log_summary(window, &summary, started);
        Ok(summary)
    }
}

fn log_document(document: &EnrichedDocument) {
    if document.response_time < 0 {
        warn!(
            event = "negative_response_time",
            ticket_id = document.ticket_id,
            ticket_nr = %document.ticket_nr,
            iteration = document.iteration,
            response_time = document.response_time,
            "reply predates the contact it answers"
        );
    }
    debug!(
        event = "document_emitted",
        ticket_id = document.ticket_id,
        ticket_nr = %document.ticket_nr,
        history_type = %document.history_type,
        timestamp = %document.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        iteration = document.iteration,
        response_time = document.response_time,
        response_time_in_hours = %document.response_time_in_hours,
        "emitted document"
    );
}

fn log_summary(window: &RunWindow, summary: &RunSummary, started: Instant) {
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        event = "import_complete",
        mode = window.mode(),
        tickets_selected = summary.tickets_selected,
        tickets_with_history = summary.tickets_with_history,
        documents_emitted = summary.documents_emitted,
        events_skipped = summary.events_skipped,
        answers_suppressed = summary.answers_suppressed,
        documents_written = summary.documents_written,
        documents_failed = summary.documents_failed,
        batches_flushed = summary.batches_flushed,
        deleted_in_window = ?summary.deleted_in_window,
        elapsed_ms,
        "import run finished"
    );
}
