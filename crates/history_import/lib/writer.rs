use history_core::EnrichedDocument;
use tracing::{debug, error, warn};

use crate::elastic::bulk::LINES_PER_DOCUMENT;
use crate::elastic::SearchIndex;
use crate::logging::format_error_report;

const LOGGED_FAILURES_PER_BATCH: usize = 5;

/// Configures write batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Bulk body lines held before a flush. One document takes [`LINES_PER_DOCUMENT`].
    pub max_lines: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self { max_lines: 400 }
    }
}

impl BatchPolicy {
    pub fn max_documents(&self) -> usize {
        (self.max_lines / LINES_PER_DOCUMENT).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterStats {
    pub documents_written: usize,
    pub documents_failed: usize,
    pub batches_flushed: usize,
}

/// Accumulates documents and ships them to the index in bulk.
///
/// Failed batches are logged and counted, never retried.
pub struct BatchWriter<'a, I: SearchIndex + ?Sized> {
    index: &'a I,
    policy: BatchPolicy,
    buffer: Vec<EnrichedDocument>,
    stats: WriterStats,
}

impl<'a, I> BatchWriter<'a, I>
where
    I: SearchIndex + ?Sized,
{
    pub fn new(index: &'a I, policy: BatchPolicy) -> Self {
        Self {
            index,
            policy,
            buffer: Vec::with_capacity(policy.max_documents()),
            stats: WriterStats::default(),
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn buffered_lines(&self) -> usize {
        self.buffer.len() * LINES_PER_DOCUMENT
    }

    /// Buffers `document`, flushing first if it would not fit under the line threshold.
    pub async fn push(&mut self, document: EnrichedDocument) {
        if !self.buffer.is_empty()
            && self.buffered_lines() + LINES_PER_DOCUMENT > self.policy.max_lines
        {
            self.flush().await;
        }
        self.buffer.push(document);
    }

    /// Sends everything buffered as one bulk request and clears the buffer.
    pub async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.buffer);
        self.stats.batches_flushed += 1;

        match self.index.bulk(&batch).await {
            Ok(outcome) => {
                let failed = batch.len().saturating_sub(outcome.indexed);
                self.stats.documents_written += outcome.indexed;
                self.stats.documents_failed += failed;

                if failed > 0 {
                    for failure in outcome.failures.iter().take(LOGGED_FAILURES_PER_BATCH) {
                        let ticket_id = batch.get(failure.position).map(|doc| doc.ticket_id);
                        warn!(
                            event = "bulk_item_rejected",
                            position = failure.position,
                            ticket_id = ?ticket_id,
                            status = failure.status,
                            reason = %failure.reason,
                            "index rejected document"
                        );
                    }
                    warn!(
                        event = "bulk_partially_failed",
                        batch_size = batch.len(),
                        indexed = outcome.indexed,
                        failed,
                        "bulk write finished with rejected documents"
                    );
                } else {
                    debug!(
                        event = "bulk_flushed",
                        batch_size = batch.len(),
                        "bulk write finished"
                    );
                }
            }
            Err(err) => {
                let error_report = format_error_report(&err);
                error!(
                    event = "bulk_failed",
                    batch_size = batch.len(),
                    error = %err,
                    error_debug = ?err,
                    error_report = %error_report,
                    "bulk write failed, dropping batch"
                );
                self.stats.documents_failed += batch.len();
            }
        }

        self.buffer.reserve(self.policy.max_documents());
    }

    /// Flushes the remainder and returns the totals for the run.
    pub async fn finish(mut self) -> WriterStats {
        self.flush().await;
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchPolicy, BatchWriter, WriterStats};
    use crate::test_support::{sample_document, BulkScript, MockIndex};

    #[tokio::test]
    async fn default_threshold_holds_two_hundred_documents() {
        let index = MockIndex::default();
        let mut writer = BatchWriter::new(&index, BatchPolicy::default());

        for iteration in 0..200 {
            writer.push(sample_document(1, iteration)).await;
        }
        assert_eq!(writer.buffered_lines(), 400);
        assert!(index.bulk_calls().is_empty());

        writer.push(sample_document(1, 200)).await;

        let calls = index.bulk_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 200);
        assert_eq!(writer.buffered(), 1);
    }

    #[tokio::test]
    async fn finish_flushes_the_remainder() {
        let index = MockIndex::default();
        let mut writer = BatchWriter::new(&index, BatchPolicy { max_lines: 4 });

        for iteration in 0..5 {
            writer.push(sample_document(7, iteration)).await;
        }
        let stats = writer.finish().await;

        let sizes: Vec<usize> = index.bulk_calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(
            stats,
            WriterStats {
                documents_written: 5,
                documents_failed: 0,
                batches_flushed: 3,
            }
        );
    }

    #[tokio::test]
    async fn threshold_below_one_document_still_makes_progress() {
        let index = MockIndex::default();
        let mut writer = BatchWriter::new(&index, BatchPolicy { max_lines: 1 });

        writer.push(sample_document(7, 0)).await;
        writer.push(sample_document(7, 1)).await;

        assert_eq!(index.bulk_calls().len(), 1);
        assert_eq!(writer.buffered(), 1);
    }

    #[tokio::test]
    async fn finishing_an_empty_writer_sends_nothing() {
        let index = MockIndex::default();
        let stats = BatchWriter::new(&index, BatchPolicy::default())
            .finish()
            .await;

        assert!(index.bulk_calls().is_empty());
        assert_eq!(stats, WriterStats::default());
    }

    #[tokio::test]
    async fn rejected_items_and_failed_requests_are_counted_not_retried() {
        let index = MockIndex::default().with_bulk_plan(vec![
            BulkScript::RejectPositions(vec![1]),
            BulkScript::Fail,
        ]);
        let mut writer = BatchWriter::new(&index, BatchPolicy { max_lines: 6 });

        for iteration in 0..6 {
            writer.push(sample_document(3, iteration)).await;
        }
        let stats = writer.finish().await;

        assert_eq!(index.bulk_calls().len(), 2);
        assert_eq!(
            stats,
            WriterStats {
                documents_written: 2,
                documents_failed: 4,
                batches_flushed: 2,
            }
        );
    }
}
