//! Canonical feature tables for tests.
//!
//! A small churn-model scenario: an offline feature table and an online
//! copy of it with deliberate skew (one drifted spend value, one unknown
//! country, one row missing on each side).

use crate::core::{FeatureRule, FeatureSpec, RecordSet};
use crate::error::Result;
use crate::sources::record_set_from_batches;
use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use std::sync::Arc;

/// The spec matching the fixture tables.
pub fn churn_spec() -> Result<FeatureSpec> {
    FeatureSpec::builder()
        .key("user_id")
        .feature(FeatureRule::numeric("spend_7d").with_abs(0.01).with_rel(0.01))
        .feature(FeatureRule::categorical("country").with_allowed(["US", "UK", "DE"]))
        .feature(FeatureRule::exact("is_active"))
        .feature(FeatureRule::numeric("age").with_range(0.0, 120.0))
        .build()
}

/// Schema shared by both fixture tables.
pub fn feature_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("spend_7d", DataType::Float64, true),
        Field::new("country", DataType::Utf8, true),
        Field::new("is_active", DataType::Boolean, true),
        Field::new("age", DataType::Int64, true),
    ]))
}

/// Offline features for users 1 through 5.
pub fn create_offline_batch() -> RecordBatch {
    build_batch(
        vec![1, 2, 3, 4, 5],
        vec![Some(100.0), Some(20.0), None, Some(7.5), Some(0.0)],
        vec![Some("US"), Some("UK"), Some("DE"), Some("US"), None],
        vec![Some(true), Some(false), Some(true), Some(true), None],
        vec![Some(34), Some(51), Some(27), Some(45), Some(19)],
    )
}

/// Online features for users 2 through 6, skewed against the offline batch:
/// user 2 drifted spend, user 4 has an unknown country.
pub fn create_online_batch() -> RecordBatch {
    build_batch(
        vec![2, 3, 4, 5, 6],
        vec![Some(23.0), None, Some(7.5), Some(0.0), Some(12.0)],
        vec![Some("UK"), Some("DE"), Some("FR"), None, Some("US")],
        vec![Some(false), Some(true), Some(true), None, Some(false)],
        vec![Some(51), Some(27), Some(45), Some(19), Some(62)],
    )
}

fn build_batch(
    user_id: Vec<i64>,
    spend: Vec<Option<f64>>,
    country: Vec<Option<&str>>,
    active: Vec<Option<bool>>,
    age: Vec<Option<i64>>,
) -> RecordBatch {
    RecordBatch::try_new(
        feature_schema(),
        vec![
            Arc::new(Int64Array::from(user_id)),
            Arc::new(Float64Array::from(spend)),
            Arc::new(StringArray::from(country)),
            Arc::new(BooleanArray::from(active)),
            Arc::new(Int64Array::from(age)),
        ],
    )
    .unwrap()
}

/// The offline fixture as a record set.
pub fn offline_records() -> Result<RecordSet> {
    record_set_from_batches("offline", &feature_schema(), &[create_offline_batch()])
}

/// The online fixture as a record set.
pub fn online_records() -> Result<RecordSet> {
    record_set_from_batches("online", &feature_schema(), &[create_online_batch()])
}

/// A session with `offline_features` and `online_features` registered.
pub async fn create_feature_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    let offline = MemTable::try_new(feature_schema(), vec![vec![create_offline_batch()]])?;
    let online = MemTable::try_new(feature_schema(), vec![vec![create_online_batch()]])?;
    ctx.register_table("offline_features", Arc::new(offline))?;
    ctx.register_table("online_features", Arc::new(online))?;
    Ok(ctx)
}
