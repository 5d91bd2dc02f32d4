//! Running a full skew check: align, compare, aggregate.

use super::aggregate::{aggregate, AggregateOptions};
use super::align::{align, Alignment};
use super::compare::{FeatureComparator, FeatureOutcome};
use super::record_set::RecordSet;
use super::spec::{FeatureRule, FeatureSpec};
use super::verdict::Verdict;
use crate::logging::{truncate_field, LogConfig};
use crate::prelude::*;
use crate::sources::FeatureSource;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Options for a skew check run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum number of sample mismatches kept in the verdict
    pub max_sample_mismatches: usize,
    /// Maximum number of example keys kept per missing side
    pub max_missing_examples: usize,
    /// Compare features on the rayon pool, one feature per task
    pub parallel: bool,
    /// Treat a feature column absent from either side as a schema error
    pub require_feature_columns: bool,
    /// Logging behaviour
    pub log: LogConfig,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_sample_mismatches: 10,
            max_missing_examples: 5,
            parallel: true,
            require_feature_columns: false,
            log: LogConfig::default(),
        }
    }
}

impl CheckConfig {
    /// Absent feature columns fail the run.
    pub fn strict() -> Self {
        Self {
            require_feature_columns: true,
            ..Self::default()
        }
    }

    /// Single-threaded comparison with verbose logging.
    pub fn debugging() -> Self {
        Self {
            parallel: false,
            max_sample_mismatches: 50,
            log: LogConfig::verbose(),
            ..Self::default()
        }
    }

    /// Sets the sample mismatch limit.
    pub fn with_max_sample_mismatches(mut self, limit: usize) -> Self {
        self.max_sample_mismatches = limit;
        self
    }

    /// Sets the missing-key example limit.
    pub fn with_max_missing_examples(mut self, limit: usize) -> Self {
        self.max_missing_examples = limit;
        self
    }

    /// Enables or disables per-feature parallelism.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enables or disables the absent-column check.
    pub fn with_require_feature_columns(mut self, require: bool) -> Self {
        self.require_feature_columns = require;
        self
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            max_sample_mismatches: self.max_sample_mismatches,
            max_missing_examples: self.max_missing_examples,
        }
    }
}

/// A feature spec bound to run options.
///
/// A check holds no state between runs; the same check can be run against
/// any number of record set pairs, concurrently if needed.
///
/// # Examples
///
/// ```rust
/// use skew_guard::core::{FeatureRule, FeatureSpec, RecordSet, SkewCheck, Value};
///
/// # fn main() -> skew_guard::prelude::Result<()> {
/// let spec = FeatureSpec::builder()
///     .key("user_id")
///     .feature(FeatureRule::numeric("spend_7d").with_abs(0.01).with_rel(0.01))
///     .build()?;
///
/// let offline = RecordSet::new("offline", vec!["user_id", "spend_7d"])?
///     .with_row(vec![Value::Int(1), Value::Float(100.0)])?;
/// let online = RecordSet::new("online", vec!["user_id", "spend_7d"])?
///     .with_row(vec![Value::Int(1), Value::Float(100.5)])?;
///
/// let verdict = SkewCheck::new(spec).run(&offline, &online)?;
/// assert!(verdict.ok);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SkewCheck {
    spec: Arc<FeatureSpec>,
    config: CheckConfig,
}

impl SkewCheck {
    /// Creates a check with default options.
    pub fn new(spec: FeatureSpec) -> Self {
        Self::with_config(spec, CheckConfig::default())
    }

    /// Creates a check with explicit options.
    pub fn with_config(spec: FeatureSpec, config: CheckConfig) -> Self {
        Self {
            spec: Arc::new(spec),
            config,
        }
    }

    /// The feature spec.
    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// The run options.
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Compares two materialized record sets.
    #[instrument(skip_all, fields(
        offline = offline.name(),
        online = online.name(),
        features = self.spec.features().len(),
        parallel = self.config.parallel
    ))]
    pub fn run(&self, offline: &RecordSet, online: &RecordSet) -> Result<Verdict> {
        self.check_feature_columns(offline, online)?;

        let alignment = align(offline, online, self.spec.keys())?;
        crate::perf_debug!(
            self.config.log,
            pairs = alignment.num_pairs(),
            only_offline = alignment.only_offline.len(),
            only_online = alignment.only_online.len(),
            "Aligned record sets"
        );
        let outcomes = self.compare_features(&alignment)?;
        let options = self.config.aggregate_options();
        let verdict = aggregate(&self.spec, &alignment, &outcomes, &options)?;

        for stats in &verdict.features {
            crate::log_comparison!(
                self.config.log,
                feature = %stats.name,
                num_rows = stats.num_rows,
                num_mismatches = stats.num_mismatches,
                mismatch_rate = stats.mismatch_rate,
                mean_abs_diff = ?stats.mean_abs_diff,
                "Feature compared"
            );
        }
        let max_len = self.config.log.max_field_length;
        for sample in &verdict.sample_mismatches {
            crate::log_comparison!(
                self.config.log,
                key = %sample.key,
                feature = %sample.feature,
                offline = %truncate_field(&sample.offline.to_string(), max_len),
                online = %truncate_field(&sample.online.to_string(), max_len),
                "Sample mismatch"
            );
        }
        if self.config.log.log_verdict_summary {
            info!(
                ok = verdict.ok,
                pairs = verdict.num_pairs,
                missing_in_online = verdict.missing_in_online,
                missing_in_offline = verdict.missing_in_offline,
                failing_features = ?verdict.failing_features,
                "Skew check finished"
            );
        }
        Ok(verdict)
    }

    /// Loads both sides concurrently, then compares them.
    #[instrument(skip_all, fields(
        offline = %offline.description(),
        online = %online.description()
    ))]
    pub async fn run_sources(
        &self,
        offline: &dyn FeatureSource,
        online: &dyn FeatureSource,
    ) -> Result<Verdict> {
        let (offline_set, online_set) = tokio::try_join!(offline.load(), online.load())?;
        crate::log_data_op!(
            self.config.log,
            offline_rows = offline_set.len(),
            online_rows = online_set.len(),
            "Loaded record sets"
        );
        self.run(&offline_set, &online_set)
    }

    fn check_feature_columns(&self, offline: &RecordSet, online: &RecordSet) -> Result<()> {
        for rule in self.spec.features() {
            for set in [offline, online] {
                if set.has_column(&rule.name) {
                    continue;
                }
                if self.config.require_feature_columns {
                    return Err(SkewError::schema(format!(
                        "feature column '{}' missing from {} records",
                        rule.name,
                        set.name()
                    )));
                }
                warn!(
                    feature = %rule.name,
                    side = set.name(),
                    "Feature column absent; comparing as null"
                );
            }
        }
        Ok(())
    }

    fn compare_features(&self, alignment: &Alignment<'_>) -> Result<Vec<Vec<FeatureOutcome>>> {
        let policy = self.spec.null_policy();
        let compare =
            |rule: &FeatureRule| FeatureComparator::new(rule, policy).compare_all(alignment);

        // collect per-feature results first so the reported error is the
        // first one in spec order regardless of scheduling
        let results: Vec<Result<Vec<FeatureOutcome>>> = if self.config.parallel {
            self.spec.features().par_iter().map(compare).collect()
        } else {
            self.spec.features().iter().map(compare).collect()
        };
        results.into_iter().collect()
    }
}

/// Compares two record sets under `spec` with the given options.
pub fn run_check(
    spec: &FeatureSpec,
    offline: &RecordSet,
    online: &RecordSet,
    config: &CheckConfig,
) -> Result<Verdict> {
    SkewCheck::with_config(spec.clone(), config.clone()).run(offline, online)
}
