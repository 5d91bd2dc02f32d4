//! The parity verdict produced by a skew check.

use super::align::DataQualityNote;
use super::record_set::KeyTuple;
use super::stats::FeatureStats;
use super::value::Value;
use serde::Serialize;

/// One mismatching (key, feature) observation kept as an example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleMismatch {
    /// Key of the matched pair
    pub key: KeyTuple,
    /// Feature that mismatched
    pub feature: String,
    /// Offline value
    pub offline: Value,
    /// Online value
    pub online: Value,
    /// Absolute difference, for numeric features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_diff: Option<f64>,
}

/// The overall result of comparing an offline and an online record set.
///
/// The verdict is `ok` only when both sides cover the same keys and every
/// feature matched on every pair. Serialized field names are stable; tools
/// reading the JSON report rely on `ok`, `missing_in_online`,
/// `missing_in_offline`, `features` and `failing_features`.
///
/// # Examples
///
/// ```rust
/// use skew_guard::core::Verdict;
///
/// # fn example(verdict: &Verdict) {
/// if !verdict.ok {
///     for name in &verdict.failing_features {
///         eprintln!("feature {name} drifted");
///     }
/// }
/// std::process::exit(verdict.exit_code());
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    /// True when no rows are missing and no feature mismatches
    pub ok: bool,
    /// Key columns used for alignment
    pub keys: Vec<String>,
    /// Number of keys present offline but absent online
    pub missing_in_online: usize,
    /// Number of keys present online but absent offline
    pub missing_in_offline: usize,
    /// A few keys missing online, in offline order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_in_online_examples: Vec<KeyTuple>,
    /// A few keys missing offline, in online order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_in_offline_examples: Vec<KeyTuple>,
    /// Number of matched pairs
    pub num_pairs: usize,
    /// Per-feature statistics, in spec order
    pub features: Vec<FeatureStats>,
    /// Names of features with at least one mismatch, in spec order
    pub failing_features: Vec<String>,
    /// First mismatches in pair order
    pub sample_mismatches: Vec<SampleMismatch>,
    /// Data-quality observations made while aligning
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<DataQualityNote>,
}

impl Verdict {
    /// Process exit code for this verdict: 0 when ok, 1 on a parity violation.
    pub fn exit_code(&self) -> i32 {
        if self.ok {
            0
        } else {
            1
        }
    }

    /// Looks up a feature's statistics by name.
    pub fn feature(&self, name: &str) -> Option<&FeatureStats> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Returns true if either side has keys the other lacks.
    pub fn has_missing_rows(&self) -> bool {
        self.missing_in_online > 0 || self.missing_in_offline > 0
    }

    /// Total number of (pair, feature) mismatches.
    pub fn total_mismatches(&self) -> usize {
        self.features.iter().map(|f| f.num_mismatches).sum()
    }

    /// Serializes the verdict as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::prelude::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
