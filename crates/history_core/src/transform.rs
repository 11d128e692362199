//! Per-ticket pass over the ordered history that derives reply iterations and response times.
//!
//! The pass is a fold: every step takes the previous [`TicketRunState`] by value and returns
//! the next one, so a ticket's state never outlives its own loop.

use chrono::NaiveDateTime;

use crate::window::SkipFilter;
use crate::{EnrichedDocument, HistoryEvent, HistoryType, Ticket};

/// The last event that made it into the output, after timestamp collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedEvent {
    pub history_type: HistoryType,
    pub create_time: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TicketRunState {
    pub last_accepted: Option<AcceptedEvent>,
    pub iteration: u32,
}

/// How an event relates to the previously accepted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Agent answer to a customer-side contact.
    QualifyingReply,
    /// Upstream logs some follow-ups twice; the copy inherits the first timestamp.
    DuplicateFollowUp,
    /// Upstream logs some answers twice; the copy is dropped.
    DuplicateAnswer,
    Plain,
}

pub fn classify(prior: HistoryType, current: HistoryType) -> Transition {
    use HistoryType::*;

    match (prior, current) {
        (EmailCustomer | FollowUp, SendAnswer) => Transition::QualifyingReply,
        (FollowUp, FollowUp) => Transition::DuplicateFollowUp,
        (SendAnswer, SendAnswer) => Transition::DuplicateAnswer,
        _ => Transition::Plain,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Emitted(EnrichedDocument),
    /// Handled by an earlier run; the row is handed back unchanged.
    SkippedAlreadyImported(HistoryEvent),
    SuppressedDuplicateAnswer,
}

/// Advances the state machine by one history row.
///
/// Skipped and suppressed rows hand back the incoming state untouched.
pub fn step(
    state: TicketRunState,
    ticket: &Ticket,
    mut event: HistoryEvent,
    filter: SkipFilter,
) -> (TicketRunState, StepOutcome) {
    if filter.skips(&event) {
        return (state, StepOutcome::SkippedAlreadyImported(event));
    }

    let mut next = state;
    let mut response_time = 0;

    if let Some(prior) = state.last_accepted {
        match classify(prior.history_type, event.history_type) {
            Transition::QualifyingReply => {
                next.iteration = next.iteration.saturating_add(1);
                // Not clamped: out-of-order source timestamps surface as negative values.
                response_time = (event.create_time - prior.create_time).num_seconds();
            }
            Transition::DuplicateFollowUp => {
                event.create_time = prior.create_time;
            }
            Transition::DuplicateAnswer => {
                return (state, StepOutcome::SuppressedDuplicateAnswer);
            }
            Transition::Plain => {}
        }
    }

    next.last_accepted = Some(AcceptedEvent {
        history_type: event.history_type,
        create_time: event.create_time,
    });

    let document = EnrichedDocument::new(ticket, &event, next.iteration, response_time);
    (next, StepOutcome::Emitted(document))
}

/// Everything one ticket contributed to a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketTransform {
    pub documents: Vec<EnrichedDocument>,
    pub state: TicketRunState,
    /// Rows the skip filter held back, in input order.
    pub skipped: Vec<HistoryEvent>,
    pub suppressed: usize,
}

pub fn transform_ticket<I>(ticket: &Ticket, events: I, filter: SkipFilter) -> TicketTransform
where
    I: IntoIterator<Item = HistoryEvent>,
{
    events
        .into_iter()
        .fold(TicketTransform::default(), |mut acc, event| {
            let (state, outcome) = step(acc.state, ticket, event, filter);
            acc.state = state;
            match outcome {
                StepOutcome::Emitted(document) => acc.documents.push(document),
                StepOutcome::SkippedAlreadyImported(event) => acc.skipped.push(event),
                StepOutcome::SuppressedDuplicateAnswer => acc.suppressed += 1,
            }
            acc
        })
}
