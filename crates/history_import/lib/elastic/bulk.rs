use std::collections::HashMap;

use history_core::EnrichedDocument;
use serde::Deserialize;
use serde_json::{json, Value};

/// Lines one document occupies in a `_bulk` body: the action and the source.
pub const LINES_PER_DOCUMENT: usize = 2;

/// Renders `documents` as an NDJSON `_bulk` body targeting `index`.
///
/// Documents carry no `_id`, so replays rely on the window reset to avoid duplicates.
pub fn bulk_payload(index: &str, documents: &[EnrichedDocument]) -> Result<String, serde_json::Error> {
    let action = serde_json::to_string(&json!({ "index": { "_index": index } }))?;

    let mut payload = String::with_capacity(documents.len() * (action.len() + 256));
    for document in documents {
        payload.push_str(&action);
        payload.push('\n');
        payload.push_str(&serde_json::to_string(document)?);
        payload.push('\n');
    }
    Ok(payload)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    /// Position of the document inside the flushed batch.
    pub position: usize,
    pub status: u16,
    pub reason: String,
}

/// Per-document result of one `_bulk` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    pub indexed: usize,
    pub failures: Vec<BulkItemFailure>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub(crate) errors: bool,
    #[serde(default)]
    pub(crate) items: Vec<HashMap<String, BulkItemResult>>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct BulkItemResult {
    pub(crate) status: u16,
    #[serde(default)]
    pub(crate) error: Option<Value>,
}

impl BulkResponse {
    pub(crate) fn into_outcome(self) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for (position, item) in self.items.into_iter().enumerate() {
            // Each item is keyed by its action name; we only ever send `index`.
            let Some(result) = item.into_values().next() else {
                continue;
            };

            match result.error {
                None if result.status < 300 => outcome.indexed += 1,
                error => outcome.failures.push(BulkItemFailure {
                    position,
                    status: result.status,
                    reason: error.as_ref().map_or_else(
                        || format!("status {}", result.status),
                        describe_item_error,
                    ),
                }),
            }
        }

        if self.errors && outcome.failures.is_empty() {
            tracing::warn!(
                event = "bulk_errors_flag_without_failed_items",
                "elasticsearch flagged bulk errors but no item carried one"
            );
        }

        outcome
    }
}

fn describe_item_error(error: &Value) -> String {
    match (
        error.get("type").and_then(Value::as_str),
        error.get("reason").and_then(Value::as_str),
    ) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (Some(kind), None) => kind.to_string(),
        (None, Some(reason)) => reason.to_string(),
        (None, None) => error.to_string(),
    }
}
