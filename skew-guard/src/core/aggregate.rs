//! Folding per-pair outcomes into a [`Verdict`].

use super::align::Alignment;
use super::compare::FeatureOutcome;
use super::spec::{FeatureRule, FeatureSpec};
use super::stats::FeatureStats;
use super::verdict::{SampleMismatch, Verdict};
use crate::prelude::*;
use rayon::prelude::*;
use tracing::{debug, instrument};

/// Number of outcomes folded per statistics shard.
const SHARD_SIZE: usize = 4096;

/// Bounds on the examples a verdict carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Maximum number of sample mismatches
    pub max_sample_mismatches: usize,
    /// Maximum number of example keys per missing side
    pub max_missing_examples: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            max_sample_mismatches: 10,
            max_missing_examples: 5,
        }
    }
}

/// Builds the verdict for one run.
///
/// `outcomes` holds one vector per feature, in the order of
/// `spec.features()`, each with one outcome per matched pair in pair order.
/// The result depends only on its inputs, so aggregating the same outcomes
/// twice yields equal verdicts.
#[instrument(skip_all, fields(pairs = alignment.num_pairs(), features = spec.features().len()))]
pub fn aggregate(
    spec: &FeatureSpec,
    alignment: &Alignment<'_>,
    outcomes: &[Vec<FeatureOutcome>],
    options: &AggregateOptions,
) -> Result<Verdict> {
    if outcomes.len() != spec.features().len() {
        return Err(SkewError::Internal(format!(
            "expected outcomes for {} features, got {}",
            spec.features().len(),
            outcomes.len()
        )));
    }
    for (rule, feature_outcomes) in spec.features().iter().zip(outcomes) {
        if feature_outcomes.len() != alignment.num_pairs() {
            return Err(SkewError::Internal(format!(
                "feature '{}' has {} outcomes for {} pairs",
                rule.name,
                feature_outcomes.len(),
                alignment.num_pairs()
            )));
        }
    }

    let features: Vec<FeatureStats> = spec
        .features()
        .iter()
        .zip(outcomes)
        .map(|(rule, feature_outcomes)| sharded_stats(rule, feature_outcomes))
        .collect();

    let failing_features: Vec<String> = features
        .iter()
        .filter(|f| f.is_failing())
        .map(|f| f.name.clone())
        .collect();

    let sample_mismatches =
        sample_mismatches(spec, alignment, outcomes, options.max_sample_mismatches);

    let missing_in_online = alignment.only_offline.len();
    let missing_in_offline = alignment.only_online.len();
    let ok = missing_in_online == 0 && missing_in_offline == 0 && failing_features.is_empty();

    debug!(
        ok,
        missing_in_online,
        missing_in_offline,
        failing = failing_features.len(),
        "Aggregated verdict"
    );

    Ok(Verdict {
        ok,
        keys: spec.keys().to_vec(),
        missing_in_online,
        missing_in_offline,
        missing_in_online_examples: alignment
            .only_offline
            .iter()
            .take(options.max_missing_examples)
            .cloned()
            .collect(),
        missing_in_offline_examples: alignment
            .only_online
            .iter()
            .take(options.max_missing_examples)
            .cloned()
            .collect(),
        num_pairs: alignment.num_pairs(),
        features,
        failing_features,
        sample_mismatches,
        notes: alignment.notes.clone(),
    })
}

/// Computes statistics shard by shard and merges the partials in shard order.
fn sharded_stats(rule: &FeatureRule, outcomes: &[FeatureOutcome]) -> FeatureStats {
    let partials: Vec<FeatureStats> = outcomes
        .par_chunks(SHARD_SIZE)
        .map(|shard| FeatureStats::from_outcomes(rule, shard))
        .collect();

    partials
        .iter()
        .fold(FeatureStats::empty(rule), |mut acc, partial| {
            acc.merge(partial);
            acc
        })
}

fn sample_mismatches(
    spec: &FeatureSpec,
    alignment: &Alignment<'_>,
    outcomes: &[Vec<FeatureOutcome>],
    limit: usize,
) -> Vec<SampleMismatch> {
    let mut samples = Vec::new();
    if limit == 0 {
        return samples;
    }
    for (i, pair) in alignment.pairs.iter().enumerate() {
        for (rule, feature_outcomes) in spec.features().iter().zip(outcomes) {
            let outcome = &feature_outcomes[i];
            if outcome.matched {
                continue;
            }
            samples.push(SampleMismatch {
                key: pair.key.clone(),
                feature: rule.name.clone(),
                offline: outcome.offline_value.clone(),
                online: outcome.online_value.clone(),
                abs_diff: outcome.abs_diff,
            });
            if samples.len() == limit {
                return samples;
            }
        }
    }
    samples
}
