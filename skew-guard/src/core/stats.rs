//! Per-feature statistics.

use super::compare::FeatureOutcome;
use super::spec::{FeatureKind, FeatureRule};
use serde::Serialize;
use std::collections::BTreeSet;

/// Aggregated comparison results for one feature.
///
/// Statistics from disjoint sets of outcomes combine with
/// [`merge`](Self::merge). Counts and value sets merge commutatively and
/// associatively; the derived rates are recomputed from the merged totals,
/// so sharding by row range gives the same result as a single pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStats {
    /// Feature name
    pub name: String,
    /// Rule kind ("numeric", "categorical", "range", "exact")
    pub kind: &'static str,
    /// Number of compared pairs
    pub num_rows: usize,
    /// Number of pairs that did not match
    pub num_mismatches: usize,
    /// `num_mismatches / num_rows`, or 0.0 with no rows
    pub mismatch_rate: f64,
    /// Mean absolute difference over pairs that produced one (numeric only)
    pub mean_abs_diff: Option<f64>,
    /// Pairs with a value outside the declared universe (categorical only)
    #[serde(rename = "unknown_categories")]
    pub unknown_category_count: Option<usize>,
    /// Mismatches caused by null disagreement
    pub null_mismatches: usize,
    /// Pairs where the column was absent on at least one side
    pub missing_column_count: usize,
    /// Pairs with a value outside the advisory bounds (when bounds are set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_range_count: Option<usize>,
    /// Distinct unknown values seen offline
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub offline_unknown: BTreeSet<String>,
    /// Distinct unknown values seen online
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub online_unknown: BTreeSet<String>,
    #[serde(skip)]
    abs_diff_sum: f64,
    #[serde(skip)]
    abs_diff_count: usize,
}

impl FeatureStats {
    /// Statistics for a feature with no compared pairs.
    pub fn empty(rule: &FeatureRule) -> Self {
        Self {
            name: rule.name.clone(),
            kind: rule.kind.as_str(),
            num_rows: 0,
            num_mismatches: 0,
            mismatch_rate: 0.0,
            mean_abs_diff: None,
            unknown_category_count: matches!(rule.kind, FeatureKind::Categorical { .. })
                .then_some(0),
            null_mismatches: 0,
            missing_column_count: 0,
            out_of_range_count: rule.effective_range().map(|_| 0),
            offline_unknown: BTreeSet::new(),
            online_unknown: BTreeSet::new(),
            abs_diff_sum: 0.0,
            abs_diff_count: 0,
        }
    }

    /// Folds a sequence of outcomes into statistics.
    pub fn from_outcomes<'o>(
        rule: &FeatureRule,
        outcomes: impl IntoIterator<Item = &'o FeatureOutcome>,
    ) -> Self {
        let mut stats = Self::empty(rule);
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats
    }

    /// Adds one outcome.
    pub fn record(&mut self, outcome: &FeatureOutcome) {
        self.num_rows += 1;
        if !outcome.matched {
            self.num_mismatches += 1;
            if outcome.null_mismatch {
                self.null_mismatches += 1;
            }
        }
        if outcome.missing_column {
            self.missing_column_count += 1;
        }
        if let Some(diff) = outcome.abs_diff {
            self.abs_diff_sum += diff;
            self.abs_diff_count += 1;
        }
        if outcome.is_unknown_category == Some(true) {
            *self.unknown_category_count.get_or_insert(0) += 1;
        }
        if outcome.unknown_offline {
            if let Some(v) = outcome.offline_value.as_category() {
                self.offline_unknown.insert(v);
            }
        }
        if outcome.unknown_online {
            if let Some(v) = outcome.online_value.as_category() {
                self.online_unknown.insert(v);
            }
        }
        if outcome.out_of_range == Some(true) {
            *self.out_of_range_count.get_or_insert(0) += 1;
        }
        self.refresh();
    }

    /// Combines statistics computed over disjoint outcomes of the same feature.
    pub fn merge(&mut self, other: &FeatureStats) {
        debug_assert_eq!(self.name, other.name, "merging stats of different features");
        self.num_rows += other.num_rows;
        self.num_mismatches += other.num_mismatches;
        self.null_mismatches += other.null_mismatches;
        self.missing_column_count += other.missing_column_count;
        self.abs_diff_sum += other.abs_diff_sum;
        self.abs_diff_count += other.abs_diff_count;
        self.unknown_category_count =
            merge_counts(self.unknown_category_count, other.unknown_category_count);
        self.out_of_range_count = merge_counts(self.out_of_range_count, other.out_of_range_count);
        self.offline_unknown.extend(other.offline_unknown.iter().cloned());
        self.online_unknown.extend(other.online_unknown.iter().cloned());
        self.refresh();
    }

    /// Returns true if any pair mismatched.
    pub fn is_failing(&self) -> bool {
        self.num_mismatches > 0
    }

    fn refresh(&mut self) {
        self.mismatch_rate = if self.num_rows == 0 {
            0.0
        } else {
            self.num_mismatches as f64 / self.num_rows as f64
        };
        self.mean_abs_diff = if self.abs_diff_count == 0 {
            None
        } else {
            Some(self.abs_diff_sum / self.abs_diff_count as f64)
        };
    }
}

fn merge_counts(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}
