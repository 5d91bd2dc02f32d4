//! Per-feature comparison of matched pairs.
//!
//! Each [`FeatureRule`] kind has exactly one comparison routine, selected in
//! [`FeatureComparator::compare_values`]. Null handling runs first and is
//! shared by every kind:
//!
//! | offline | online | nullable | `Same`    | `AllowBothNull` |
//! |---------|--------|----------|-----------|-----------------|
//! | null    | null   | true     | match     | match           |
//! | null    | null   | false    | violation | match           |
//! | one side null   || any      | violation | violation       |
//!
//! A column the pipeline did not emit is compared as null and flagged as
//! `missing_column` on the outcome.

use super::align::{Alignment, MatchedPair};
use super::spec::{FeatureKind, FeatureRule, NullPolicy, ValueRange};
use super::value::Value;
use crate::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{instrument, trace};

/// Floor for the relative-tolerance scale, so values near zero do not make
/// the threshold collapse.
pub const REL_EPSILON: f64 = 1e-12;

/// The result of comparing one feature on one matched pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureOutcome {
    /// Index of the matched pair this outcome belongs to
    pub row: usize,
    /// Whether the pair is considered equal under the rule
    pub matched: bool,
    /// Offline value (null when absent)
    pub offline_value: Value,
    /// Online value (null when absent)
    pub online_value: Value,
    /// Absolute difference, for numeric rules with both sides present
    pub abs_diff: Option<f64>,
    /// For categorical rules with a declared universe: whether either side
    /// is outside it
    pub is_unknown_category: Option<bool>,
    /// Offline value is outside the declared universe
    pub unknown_offline: bool,
    /// Online value is outside the declared universe
    pub unknown_online: bool,
    /// For rules with advisory bounds: whether either side is outside them
    pub out_of_range: Option<bool>,
    /// The feature column was not emitted for this row on at least one side
    pub missing_column: bool,
    /// The mismatch comes from the null table rather than the value rule
    pub null_mismatch: bool,
}

/// Compares one feature on one matched pair.
///
/// Convenience wrapper around [`FeatureComparator`]; prefer the comparator
/// when comparing many pairs for the same rule.
pub fn compare(
    rule: &FeatureRule,
    null_policy: NullPolicy,
    pair: &MatchedPair<'_>,
) -> Result<FeatureOutcome> {
    FeatureComparator::new(rule, null_policy).compare(pair)
}

/// A comparison rule prepared for repeated use.
#[derive(Debug, Clone)]
pub struct FeatureComparator<'r> {
    rule: &'r FeatureRule,
    null_policy: NullPolicy,
    allowed: Option<HashSet<&'r str>>,
    range: Option<ValueRange>,
}

impl<'r> FeatureComparator<'r> {
    /// Prepares `rule` for comparison under `null_policy`.
    pub fn new(rule: &'r FeatureRule, null_policy: NullPolicy) -> Self {
        let allowed = match &rule.kind {
            FeatureKind::Categorical {
                allowed: Some(allowed),
            } => Some(allowed.iter().map(String::as_str).collect()),
            _ => None,
        };
        Self {
            rule,
            null_policy,
            allowed,
            range: rule.effective_range(),
        }
    }

    /// The rule being applied.
    pub fn rule(&self) -> &'r FeatureRule {
        self.rule
    }

    /// Compares the feature on one matched pair.
    pub fn compare(&self, pair: &MatchedPair<'_>) -> Result<FeatureOutcome> {
        self.compare_values(
            pair.index,
            pair.offline.get(&self.rule.name),
            pair.online.get(&self.rule.name),
        )
    }

    /// Compares the feature across every matched pair of an alignment, in
    /// pair order.
    #[instrument(skip_all, fields(feature = %self.rule.name, kind = self.rule.kind.as_str()))]
    pub fn compare_all(&self, alignment: &Alignment<'_>) -> Result<Vec<FeatureOutcome>> {
        let offline_column = alignment.offline().column_index(&self.rule.name);
        let online_column = alignment.online().column_index(&self.rule.name);

        let mut outcomes = Vec::with_capacity(alignment.num_pairs());
        for pair in &alignment.pairs {
            let outcome = self.compare_values(
                pair.index,
                offline_column.and_then(|i| pair.offline.get_at(i)),
                online_column.and_then(|i| pair.online.get_at(i)),
            )?;
            if !outcome.matched {
                trace!(
                    key = %pair.key,
                    offline = %outcome.offline_value,
                    online = %outcome.online_value,
                    abs_diff = ?outcome.abs_diff,
                    "Feature mismatch"
                );
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Compares two cells. `None` means the column was not emitted.
    pub fn compare_values(
        &self,
        row: usize,
        offline: Option<&Value>,
        online: Option<&Value>,
    ) -> Result<FeatureOutcome> {
        let missing_column = offline.is_none() || online.is_none();
        let offline = offline.cloned().unwrap_or(Value::Null);
        let online = online.cloned().unwrap_or(Value::Null);

        let mut outcome = FeatureOutcome {
            row,
            matched: false,
            abs_diff: None,
            is_unknown_category: None,
            unknown_offline: false,
            unknown_online: false,
            out_of_range: self.out_of_range(&offline, &online),
            missing_column,
            null_mismatch: false,
            offline_value: offline,
            online_value: online,
        };

        if let Some(allowed) = &self.allowed {
            outcome.unknown_offline = self.is_unknown(allowed, &outcome.offline_value)?;
            outcome.unknown_online = self.is_unknown(allowed, &outcome.online_value)?;
            outcome.is_unknown_category = Some(outcome.unknown_offline || outcome.unknown_online);
        }

        let offline_null = outcome.offline_value.is_null();
        let online_null = outcome.online_value.is_null();
        if offline_null || online_null {
            outcome.matched = offline_null
                && online_null
                && (self.null_policy == NullPolicy::AllowBothNull || self.rule.nullable);
            outcome.null_mismatch = !outcome.matched;
            return Ok(outcome);
        }

        let (matched, abs_diff) = match &self.rule.kind {
            FeatureKind::Numeric { abs, rel } => {
                self.compare_numeric(&outcome.offline_value, &outcome.online_value, *abs, *rel)?
            }
            FeatureKind::Range { .. } => {
                self.compare_numeric(&outcome.offline_value, &outcome.online_value, None, None)?
            }
            FeatureKind::Categorical { .. } => (
                self.compare_categorical(&outcome.offline_value, &outcome.online_value)?,
                None,
            ),
            FeatureKind::Exact => (
                self.compare_exact(&outcome.offline_value, &outcome.online_value)?,
                None,
            ),
        };
        outcome.matched = matched;
        outcome.abs_diff = abs_diff;
        Ok(outcome)
    }

    fn numeric(&self, value: &Value) -> Result<f64> {
        value
            .as_f64()
            .ok_or_else(|| SkewError::type_error(&self.rule.name, "numeric", value.type_name()))
    }

    fn compare_numeric(
        &self,
        offline: &Value,
        online: &Value,
        abs: Option<f64>,
        rel: Option<f64>,
    ) -> Result<(bool, Option<f64>)> {
        let a = self.numeric(offline)?;
        let b = self.numeric(online)?;

        // integer pairs keep an exact difference; f64 loses precision past 2^53
        let int_diff = match (offline, online) {
            (Value::Int(x), Value::Int(y)) => Some((*x as i128 - *y as i128).unsigned_abs()),
            _ => None,
        };
        let equal = int_diff.map_or(a == b, |d| d == 0);
        if equal {
            return Ok((true, Some(0.0)));
        }
        let diff = int_diff.map_or((a - b).abs(), |d| d as f64);

        // an infinite value only ever matches the same infinity
        let no_tolerance = abs.is_none() && rel.is_none();
        if no_tolerance || !a.is_finite() || !b.is_finite() {
            return Ok((false, Some(diff)));
        }

        let within_abs = abs.is_some_and(|tolerance| match int_diff {
            Some(d) => d <= tolerance.floor() as u128,
            None => diff <= tolerance,
        });
        let scale = a.abs().max(b.abs()).max(REL_EPSILON);
        let within_rel = rel.is_some_and(|tolerance| diff <= tolerance * scale);
        Ok((within_abs || within_rel, Some(diff)))
    }

    fn category(&self, value: &Value) -> Result<String> {
        value
            .as_category()
            .ok_or_else(|| SkewError::type_error(&self.rule.name, "categorical", value.type_name()))
    }

    fn is_unknown(&self, allowed: &HashSet<&str>, value: &Value) -> Result<bool> {
        if value.is_null() {
            return Ok(false);
        }
        let category = self.category(value)?;
        Ok(!allowed.contains(category.as_str()))
    }

    fn compare_categorical(&self, offline: &Value, online: &Value) -> Result<bool> {
        Ok(self.category(offline)? == self.category(online)?)
    }

    fn compare_exact(&self, offline: &Value, online: &Value) -> Result<bool> {
        match (offline, online) {
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.to_utc() == b.to_utc()),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(offline.as_f64() == online.as_f64())
            }
            _ => Err(SkewError::type_error(
                &self.rule.name,
                offline.type_name(),
                online.type_name(),
            )),
        }
    }

    fn out_of_range(&self, offline: &Value, online: &Value) -> Option<bool> {
        let range = self.range?;
        Some(
            [offline, online]
                .into_iter()
                .filter(|v| !v.is_null())
                .filter_map(Value::as_f64)
                .any(|v| !range.contains(v)),
        )
    }
}
