//! # skew-guard - Training/Serving Skew Detection for Rust
//!
//! skew-guard compares the feature values an offline (training) pipeline
//! and an online (serving) pipeline compute for the same logical rows, and
//! reports where they diverge. It answers one question with a verdict that
//! is safe to gate a deploy on: *do both pipelines produce the same
//! features for the same inputs?*
//!
//! ## Overview
//!
//! A check is driven by a declarative [`FeatureSpec`](core::FeatureSpec):
//! the key columns identifying a logical row, a null policy, and one
//! comparison rule per feature:
//!
//! - **numeric**: absolute and/or relative tolerance (either one suffices)
//! - **categorical**: string equality, with optional detection of values
//!   outside a declared universe
//! - **range**: advisory bounds, counted but never failing a row
//! - **exact**: strings, booleans and timestamps (compared as UTC instants)
//!
//! Rows are joined on the key columns, each feature is compared pair by
//! pair, and the results are folded into a [`Verdict`](core::Verdict) with
//! per-feature mismatch rates, missing rows on either side, and a bounded
//! list of sample mismatches.
//!
//! ## Quick Start
//!
//! ```rust
//! use skew_guard::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let spec = FeatureSpec::from_json_str(r#"{
//!     "version": 1,
//!     "keys": ["user_id"],
//!     "null_policy": "same",
//!     "features": [
//!         {"name": "spend_7d", "kind": "numeric", "abs": 0.01, "rel": 0.01},
//!         {"name": "country", "kind": "categorical", "allowed": ["US", "UK"]}
//!     ]
//! }"#)?;
//!
//! let offline = RecordSet::new("offline", vec!["user_id", "spend_7d", "country"])?
//!     .with_row(vec![Value::Int(1), Value::Float(100.0), Value::from("US")])?
//!     .with_row(vec![Value::Int(2), Value::Float(20.0), Value::from("UK")])?;
//! let online = RecordSet::new("online", vec!["user_id", "spend_7d", "country"])?
//!     .with_row(vec![Value::Int(2), Value::Float(20.0), Value::from("UK")])?
//!     .with_row(vec![Value::Int(1), Value::Float(100.5), Value::from("US")])?;
//!
//! let verdict = SkewCheck::new(spec).run(&offline, &online)?;
//! assert!(verdict.ok);
//! assert_eq!(verdict.exit_code(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Loading data
//!
//! The engine itself never performs I/O. Record sets come from a
//! [`FeatureSource`](sources::FeatureSource): an in-memory set, a JSON rows
//! file, Arrow record batches, or a DataFusion SQL query.
//!
//! ```rust,no_run
//! use skew_guard::prelude::*;
//! use skew_guard::sources::JsonRowsSource;
//!
//! # async fn example() -> Result<()> {
//! let spec = FeatureSpec::from_path("features.toml")?;
//! let offline = JsonRowsSource::new("offline", "offline.json").with_timestamp_column("event_ts");
//! let online = JsonRowsSource::new("online", "online.jsonl").with_timestamp_column("event_ts");
//!
//! let verdict = SkewCheck::new(spec).run_sources(&offline, &online).await?;
//! std::process::exit(verdict.exit_code());
//! # }
//! ```
//!
//! ## Reports
//!
//! [`formatters`] renders a verdict as JSON (stable field names), human
//! text, Markdown or HTML.
//!
//! ## Logging
//!
//! All components emit `tracing` events; see [`logging`] for the
//! configuration knobs and for installing a subscriber in binaries.

pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod sources;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
