//! Prelude for commonly used types and traits in skew-guard.

pub use crate::core::{
    CheckConfig, FeatureRule, FeatureSpec, NullPolicy, RecordSet, SkewCheck, Value, Verdict,
};
pub use crate::error::{ErrorContext, Result, SkewError};
pub use crate::formatters::{FormatterConfig, VerdictFormatter};
pub use crate::logging::LogConfig;
pub use crate::sources::FeatureSource;
