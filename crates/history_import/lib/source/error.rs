use diesel::result::Error as DieselError;
use diesel::ConnectionError;
use history_core::UnknownHistoryType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("could not connect to the helpdesk database: {0}")]
    Connect(#[from] ConnectionError),

    #[error(transparent)]
    Query(#[from] DieselError),

    #[error("history row {history_id} has an unexpected type: {source}")]
    UnknownHistoryType {
        history_id: i64,
        #[source]
        source: UnknownHistoryType,
    },
}
