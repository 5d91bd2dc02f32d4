//! Record sources feeding the parity engine.
//!
//! A [`FeatureSource`] produces one fully materialized [`RecordSet`] for a
//! pipeline side. Sources own their I/O and run on the async runtime; the
//! engine only ever sees the finished record set.
//!
//! | Source | Input |
//! |---|---|
//! | [`MemorySource`] | a record set built in code |
//! | [`JsonRowsSource`] | a JSON array of row objects, or JSON lines |
//! | [`RecordBatchSource`] | Arrow record batches |
//! | [`SqlSource`] | a DataFusion SQL query |
//! | [`FileSource`] | a CSV or Parquet file |
//! | [`HttpSource`] | a feature service answering batched JSON requests |

use crate::core::RecordSet;
use crate::prelude::*;
use async_trait::async_trait;
use std::fmt::Debug;

mod batch;
mod file;
mod http;
mod json;
mod memory;
mod query;

pub use batch::{record_set_from_batches, RecordBatchSource};
pub use file::{CsvOptions, FileFormat, FileSource};
pub use http::HttpSource;
pub use json::{JsonLayout, JsonRowsSource};
pub use memory::MemorySource;
pub use query::SqlSource;

/// Produces the records of one pipeline side.
///
/// # Examples
///
/// ```rust
/// use skew_guard::core::{RecordSet, Value};
/// use skew_guard::sources::{FeatureSource, MemorySource};
///
/// # async fn example() -> skew_guard::prelude::Result<()> {
/// let set = RecordSet::new("online", vec!["user_id"])?.with_row(vec![Value::Int(1)])?;
/// let source = MemorySource::new(set);
/// let loaded = source.load().await?;
/// assert_eq!(loaded.len(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FeatureSource: Debug + Send + Sync {
    /// Loads every record.
    async fn load(&self) -> Result<RecordSet>;

    /// A human-readable description, used in logs and errors.
    fn description(&self) -> String;
}
