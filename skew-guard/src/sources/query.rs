//! DataFusion SQL queries.

use super::batch::record_set_from_batches;
use super::FeatureSource;
use crate::core::RecordSet;
use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Materializes the result of a SQL query as a record set.
///
/// Tables are registered on the session context by the caller, which lets
/// one context serve both sides (e.g. an offline feature table and a log of
/// online feature values).
///
/// # Examples
///
/// ```rust,no_run
/// use datafusion::prelude::*;
/// use skew_guard::sources::{FeatureSource, SqlSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = SessionContext::new();
/// ctx.register_parquet("features", "features.parquet", ParquetReadOptions::default()).await?;
///
/// let offline = SqlSource::new(
///     "offline",
///     ctx.clone(),
///     "SELECT user_id, spend_7d FROM features WHERE ds = '2024-01-01'",
/// );
/// let records = offline.load().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SqlSource {
    name: String,
    ctx: Arc<SessionContext>,
    query: String,
}

impl SqlSource {
    /// Creates a source running `query` on `ctx`.
    pub fn new(name: impl Into<String>, ctx: SessionContext, query: impl Into<String>) -> Self {
        Self::with_shared_context(name, Arc::new(ctx), query)
    }

    /// Creates a source on a context shared with other sources.
    pub fn with_shared_context(
        name: impl Into<String>,
        ctx: Arc<SessionContext>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ctx,
            query: query.into(),
        }
    }

    /// The SQL text.
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl std::fmt::Debug for SqlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSource")
            .field("name", &self.name)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FeatureSource for SqlSource {
    #[instrument(skip(self), fields(name = %self.name))]
    async fn load(&self) -> Result<RecordSet> {
        let df = self.ctx.sql(&self.query).await?;
        let schema = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await?;
        debug!(batches = batches.len(), "Collected query results");
        record_set_from_batches(self.name.clone(), &schema, &batches)
    }

    fn description(&self) -> String {
        format!("SQL query '{}': {}", self.name, self.query)
    }
}
