use thiserror::Error;

use crate::elastic::IndexError;
use crate::source::SourceError;

/// Failures that abort an import run.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not clear the import window")]
    WindowReset(#[source] IndexError),

    #[error("could not select tickets")]
    Selection(#[source] SourceError),

    #[error("could not load history for ticket {ticket_id}")]
    QueryExecution {
        ticket_id: i64,
        #[source]
        source: SourceError,
    },
}
