use chrono::NaiveDateTime;
use tracing::info;

use crate::elastic::{IndexError, SearchIndex};

/// Clears every indexed document from `from` onwards so the run can rebuild that range.
///
/// Returns the number of deleted documents. It is only logged; there is nothing to act on.
pub async fn reset_window<I>(index: &I, from: NaiveDateTime) -> Result<u64, IndexError>
where
    I: SearchIndex + ?Sized,
{
    let from = from.and_utc();
    let deleted = index.delete_from(from).await?;

    info!(
        event = "window_reset",
        from = %from.format("%Y-%m-%dT%H:%M:%SZ"),
        deleted,
        "deleted documents in import window"
    );
    Ok(deleted)
}
