//! The parity engine.
//!
//! A run takes a validated [`FeatureSpec`] and two materialized
//! [`RecordSet`]s (offline and online) and produces a [`Verdict`]:
//!
//! ```text
//! offline ─┐
//!          ├─ align ──> MatchedPair* ── compare (per feature) ──> FeatureOutcome*
//! online  ─┘                │                                          │
//!                           └── only_offline / only_online / notes     │
//!                                                  │                   │
//!                                                  └──── aggregate ────┴──> Verdict
//! ```
//!
//! Every stage is synchronous and pure; loading data is the job of
//! [`sources`](crate::sources).
//!
//! ## Example
//!
//! ```rust
//! use skew_guard::core::{FeatureRule, FeatureSpec, RecordSet, SkewCheck, Value};
//!
//! # fn main() -> skew_guard::prelude::Result<()> {
//! let spec = FeatureSpec::builder()
//!     .key("user_id")
//!     .feature(FeatureRule::categorical("country").with_allowed(["US", "UK"]))
//!     .build()?;
//!
//! let offline = RecordSet::new("offline", vec!["user_id", "country"])?
//!     .with_row(vec![Value::Int(1), Value::from("US")])?;
//! let online = RecordSet::new("online", vec!["user_id", "country"])?
//!     .with_row(vec![Value::Int(1), Value::from("DE")])?;
//!
//! let verdict = SkewCheck::new(spec).run(&offline, &online)?;
//! assert!(!verdict.ok);
//! assert_eq!(verdict.failing_features, vec!["country"]);
//! assert_eq!(verdict.features[0].unknown_category_count, Some(1));
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod align;
mod compare;
mod record_set;
mod runner;
mod spec;
mod stats;
mod value;
mod verdict;

pub use aggregate::{aggregate, AggregateOptions};
pub use align::{align, Alignment, DataQualityNote, MatchedPair, RowRef, Side};
pub use compare::{compare, FeatureComparator, FeatureOutcome, REL_EPSILON};
pub use record_set::{KeyTuple, RecordSet, Row};
pub use runner::{run_check, CheckConfig, SkewCheck};
pub use spec::{FeatureKind, FeatureRule, FeatureSpec, FeatureSpecBuilder, NullPolicy, ValueRange};
pub use stats::FeatureStats;
pub use value::{Timestamp, Value};
pub use verdict::{SampleMismatch, Verdict};
