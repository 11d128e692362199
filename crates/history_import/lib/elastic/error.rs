use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("invalid elasticsearch url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unexpected HTTP status {status} from {operation}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not encode bulk payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}
