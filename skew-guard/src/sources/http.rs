//! Feature services reached over HTTP.

use super::json::parse_timestamp_columns;
use super::FeatureSource;
use crate::core::{RecordSet, Value};
use crate::prelude::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

type JsonRow = BTreeMap<String, Value>;

const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Computes features by POSTing input rows to a serving endpoint.
///
/// Input rows are sent in batches as a JSON array of objects; the endpoint
/// answers each batch with a JSON array of feature rows. The responses are
/// concatenated in batch order. A failed batch (transport error, non-200
/// status, or a body that is not an array of objects) is retried with a
/// short linear backoff before the load fails.
///
/// # Examples
///
/// ```rust,no_run
/// use skew_guard::core::{RecordSet, Value};
/// use skew_guard::sources::{FeatureSource, HttpSource};
/// use std::time::Duration;
///
/// # async fn example() -> skew_guard::prelude::Result<()> {
/// let inputs = RecordSet::new("inputs", vec!["user_id", "country"])?
///     .with_row(vec![Value::Int(1), Value::from("US")])?;
///
/// let online = HttpSource::new("online", "http://localhost:8080/features", inputs)
///     .with_batch_size(128)
///     .with_header("Authorization", "Bearer token")
///     .with_timeout(Duration::from_secs(5))
///     .with_retries(2);
/// let records = online.load().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpSource {
    name: String,
    url: String,
    input: Arc<RecordSet>,
    batch_size: usize,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    retries: usize,
    timestamp_columns: Vec<String>,
}

impl HttpSource {
    /// Creates a source sending the rows of `input` to `url`.
    pub fn new(name: impl Into<String>, url: impl Into<String>, input: RecordSet) -> Self {
        Self::with_shared_input(name, url, Arc::new(input))
    }

    /// Creates a source over input rows shared with other sources.
    pub fn with_shared_input(
        name: impl Into<String>,
        url: impl Into<String>,
        input: Arc<RecordSet>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            input,
            batch_size: 256,
            headers: Vec::new(),
            timeout: Some(Duration::from_secs(10)),
            retries: 1,
            timestamp_columns: Vec::new(),
        }
    }

    /// Sets how many rows go into one request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Adds a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the per-request timeout; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Sets how many times a failed batch is retried.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Declares a response column whose strings should be parsed as
    /// timestamps.
    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_columns.push(column.into());
        self
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| {
            SkewError::data_source_with_source("HTTP", "failed to build client", Box::new(e))
        })
    }

    fn batch_payload(&self, start: usize, end: usize) -> Vec<BTreeMap<&str, &Value>> {
        let columns = self.input.columns();
        self.input.rows()[start..end]
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .filter_map(|(i, column)| row.get(i).map(|value| (column.as_str(), value)))
                    .collect()
            })
            .collect()
    }

    async fn post_batch(
        &self,
        client: &reqwest::Client,
        payload: &[BTreeMap<&str, &Value>],
    ) -> Result<Vec<JsonRow>> {
        let mut last_error = None;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(50 * attempt as u64).min(MAX_BACKOFF);
                tokio::time::sleep(backoff).await;
            }
            match self.try_post(client, payload).await {
                Ok(rows) => return Ok(rows),
                Err(err) => {
                    warn!(
                        url = %self.url,
                        attempt = attempt + 1,
                        error = %err,
                        "Feature request failed"
                    );
                    last_error = Some(err);
                }
            }
        }
        let attempts = self.retries + 1;
        Err(match last_error {
            Some(err) => SkewError::data_source_with_source(
                "HTTP",
                format!("request to {} failed after {attempts} attempt(s)", self.url),
                Box::new(err),
            ),
            None => SkewError::Internal("feature request made no attempts".to_string()),
        })
    }

    async fn try_post(
        &self,
        client: &reqwest::Client,
        payload: &[BTreeMap<&str, &Value>],
    ) -> Result<Vec<JsonRow>> {
        let mut request = client.post(&self.url).json(payload);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(|e| {
            SkewError::data_source_with_source("HTTP", "request failed", Box::new(e))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            SkewError::data_source_with_source("HTTP", "failed to read response", Box::new(e))
        })?;
        if status != reqwest::StatusCode::OK {
            let text = String::from_utf8_lossy(&body);
            let snippet: String = text.chars().take(200).collect();
            return Err(SkewError::data_source("HTTP", format!("HTTP {status}: {snippet}")));
        }
        serde_json::from_slice(&body).map_err(|e| {
            SkewError::data_source_with_source(
                "HTTP",
                "expected a JSON array of row objects",
                Box::new(e),
            )
        })
    }
}

impl fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // header values may carry credentials
        let header_names: Vec<&str> =
            self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("HttpSource")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("input_rows", &self.input.len())
            .field("batch_size", &self.batch_size)
            .field("headers", &header_names)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FeatureSource for HttpSource {
    #[instrument(skip(self), fields(
        name = %self.name,
        url = %self.url,
        rows = self.input.len()
    ))]
    async fn load(&self) -> Result<RecordSet> {
        if self.input.is_empty() {
            return RecordSet::new(self.name.clone(), self.input.columns().to_vec());
        }

        let client = self.client()?;
        let total = self.input.len();
        let mut rows = Vec::with_capacity(total);
        for start in (0..total).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(total);
            let payload = self.batch_payload(start, end);
            let batch = self.post_batch(&client, &payload).await?;
            debug!(start, sent = end - start, received = batch.len(), "Feature batch returned");
            rows.extend(batch);
        }

        let mut set = RecordSet::from_maps(self.name.clone(), rows)?;
        parse_timestamp_columns(&mut set, &self.timestamp_columns, "HTTP")?;
        Ok(set)
    }

    fn description(&self) -> String {
        format!("HTTP endpoint '{}' at {}", self.name, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> RecordSet {
        let mut set = RecordSet::new("inputs", vec!["id", "a"]).unwrap();
        set.push_row(vec![Value::Int(1), Value::Int(10)]).unwrap();
        set.push_cells(vec![Some(Value::Int(2)), None]).unwrap();
        set
    }

    #[test]
    fn test_payload_skips_absent_cells() {
        let source = HttpSource::new("online", "http://localhost:1", inputs());
        let payload = source.batch_payload(0, 2);
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"[{"a":10,"id":1},{"id":2}]"#
        );
    }

    #[test]
    fn test_debug_hides_header_values() {
        let source = HttpSource::new("online", "http://localhost:1", inputs())
            .with_header("Authorization", "Bearer secret");
        let debug = format!("{source:?}");
        assert!(debug.contains("Authorization"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let source = HttpSource::new("online", "http://localhost:1", inputs()).with_batch_size(0);
        assert_eq!(source.batch_size, 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let empty = RecordSet::new("inputs", vec!["id"]).unwrap();
        let set = HttpSource::new("online", "http://127.0.0.1:9/unused", empty)
            .load()
            .await
            .unwrap();
        assert!(set.is_empty());
        assert_eq!(set.columns(), &["id".to_string()]);
    }
}
