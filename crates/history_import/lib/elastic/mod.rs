pub mod bulk;
pub mod error;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use history_core::EnrichedDocument;
use reqwest::{header, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use bulk::{bulk_payload, BulkOutcome, BulkResponse};
pub use error::IndexError;

/// Write side of the analytics index.
pub trait SearchIndex: Send + Sync {
    /// Deletes every document with `@timestamp >= from`, returning how many went away.
    fn delete_from<'a>(&'a self, from: DateTime<Utc>) -> BoxFuture<'a, Result<u64, IndexError>>;

    fn bulk<'a>(
        &'a self,
        documents: &'a [EnrichedDocument],
    ) -> BoxFuture<'a, Result<BulkOutcome, IndexError>>;
}

impl<T> SearchIndex for Arc<T>
where
    T: SearchIndex + ?Sized,
{
    fn delete_from<'a>(&'a self, from: DateTime<Utc>) -> BoxFuture<'a, Result<u64, IndexError>> {
        (**self).delete_from(from)
    }

    fn bulk<'a>(
        &'a self,
        documents: &'a [EnrichedDocument],
    ) -> BoxFuture<'a, Result<BulkOutcome, IndexError>> {
        (**self).bulk(documents)
    }
}

/// Body of a delete-by-query covering everything from `from` onwards.
pub fn delete_window_query(from: DateTime<Utc>) -> serde_json::Value {
    json!({
        "query": {
            "range": {
                "@timestamp": { "gte": from.format("%Y-%m-%dT%H:%M:%SZ").to_string() }
            }
        }
    })
}

#[derive(Deserialize, Debug)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

/// Elasticsearch over its REST API.
pub struct ElasticIndex {
    client: reqwest::Client,
    base_url: Url,
    index: String,
}

impl ElasticIndex {
    pub fn new(base_url: &str, index: impl Into<String>) -> Result<Self, IndexError> {
        let base_url = Url::parse(base_url).map_err(|err| IndexError::InvalidUrl {
            url: base_url.to_string(),
            message: err.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(IndexError::InvalidUrl {
                url: base_url.to_string(),
                message: "expected an http(s) url".to_string(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            index: index.into(),
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, IndexError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "cannot be used as a base url".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn delete_window(&self, from: DateTime<Utc>) -> Result<u64, IndexError> {
        let mut url = self.endpoint(&[self.index.as_str(), "_delete_by_query"])?;
        url.query_pairs_mut()
            .append_pair("conflicts", "proceed")
            .append_pair("refresh", "true");

        let response = self
            .client
            .post(url)
            .json(&delete_window_query(from))
            .send()
            .await?;

        // A first import runs before the index exists; there is nothing to delete then.
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(
                event = "window_reset_index_missing",
                index = %self.index,
                "index does not exist yet, nothing to delete"
            );
            return Ok(0);
        }
        let response = expect_success(response, "delete_by_query").await?;

        Ok(response.json::<DeleteByQueryResponse>().await?.deleted)
    }

    async fn send_bulk(&self, documents: &[EnrichedDocument]) -> Result<BulkOutcome, IndexError> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let payload = bulk_payload(&self.index, documents)?;
        let response = self
            .client
            .post(self.endpoint(&["_bulk"])?)
            .header(header::CONTENT_TYPE, "application/x-ndjson")
            .body(payload)
            .send()
            .await?;
        let response = expect_success(response, "bulk").await?;

        Ok(response.json::<BulkResponse>().await?.into_outcome())
    }
}

async fn expect_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IndexError::UnexpectedStatus {
        operation,
        status: status.as_u16(),
        body,
    })
}

impl SearchIndex for ElasticIndex {
    fn delete_from<'a>(&'a self, from: DateTime<Utc>) -> BoxFuture<'a, Result<u64, IndexError>> {
        Box::pin(self.delete_window(from))
    }

    fn bulk<'a>(
        &'a self,
        documents: &'a [EnrichedDocument],
    ) -> BoxFuture<'a, Result<BulkOutcome, IndexError>> {
        Box::pin(self.send_bulk(documents))
    }
}
