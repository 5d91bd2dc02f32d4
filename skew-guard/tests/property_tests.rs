//! Property-based tests for the parity engine.
//!
//! Generates random offline/online feature tables and checks properties that
//! must hold for every input:
//! - comparing a table with itself never reports skew
//! - parallel and sequential runs produce identical verdicts
//! - widening a tolerance never increases the mismatch count
//! - merging shard statistics equals folding all outcomes at once
//! - the missing-row counts match the key set difference
//! - a numeric pair matches only when its difference is finite and within
//!   tolerance, including infinities and integers beyond 2^53

use proptest::prelude::*;
use skew_guard::core::{
    CheckConfig, FeatureComparator, FeatureOutcome, FeatureRule, FeatureSpec, FeatureStats,
    NullPolicy, RecordSet, SkewCheck, Value,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
struct GeneratedRow {
    id: i64,
    amount: Option<f64>,
    segment: Option<String>,
}

fn row_strategy() -> impl Strategy<Value = GeneratedRow> {
    (
        0i64..60,
        prop::option::weighted(0.9, -1_000.0f64..1_000.0),
        prop::option::weighted(0.9, prop::sample::select(vec!["a", "b", "c", "z"])),
    )
        .prop_map(|(id, amount, segment)| GeneratedRow {
            id,
            amount,
            segment: segment.map(str::to_string),
        })
}

fn rows_strategy() -> impl Strategy<Value = Vec<GeneratedRow>> {
    prop::collection::vec(row_strategy(), 0..80)
}

fn to_set(name: &str, rows: &[GeneratedRow]) -> RecordSet {
    let mut set = RecordSet::new(name, vec!["id", "amount", "segment"]).unwrap();
    for row in rows {
        set.push_row(vec![
            Value::Int(row.id),
            row.amount.map(Value::Float).unwrap_or(Value::Null),
            row.segment.clone().map(Value::String).unwrap_or(Value::Null),
        ])
        .unwrap();
    }
    set
}

fn spec(abs: f64) -> FeatureSpec {
    FeatureSpec::builder()
        .key("id")
        .feature(FeatureRule::numeric("amount").with_abs(abs).nullable(true))
        .feature(
            FeatureRule::categorical("segment")
                .with_allowed(["a", "b", "c"])
                .nullable(true),
        )
        .build()
        .unwrap()
}

fn numeric_outcomes(pairs: &[(Option<f64>, Option<f64>)]) -> (FeatureRule, Vec<FeatureOutcome>) {
    let rule = FeatureRule::numeric("amount").with_abs(1.0).with_range(-500.0, 500.0);
    let comparator = FeatureComparator::new(&rule, NullPolicy::Same);
    let outcomes = pairs
        .iter()
        .enumerate()
        .map(|(i, (a, b))| {
            let a = a.map(Value::Float).unwrap_or(Value::Null);
            let b = b.map(Value::Float).unwrap_or(Value::Null);
            comparator.compare_values(i, Some(&a), Some(&b)).unwrap()
        })
        .collect();
    (rule, outcomes)
}

/// Finite floats of every magnitude plus both infinities. NaN is left out
/// because it reads as null.
fn extreme_float() -> impl Strategy<Value = f64> {
    prop_oneof![
        2 => -1_000.0f64..1_000.0,
        1 => prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO,
        1 => prop::sample::select(vec![
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::MAX,
            -f64::MAX,
            1e308,
            -1e308,
        ]),
    ]
}

/// Pairs of nearby integers, many of them too large for an f64 to hold
/// exactly.
fn integer_pair() -> impl Strategy<Value = (i64, i64)> {
    let base = prop_oneof![
        any::<i64>(),
        ((1i64 << 53) - 4)..((1i64 << 53) + 4),
        ((1i64 << 62) - 4)..((1i64 << 62) + 4),
        prop::sample::select(vec![i64::MAX, i64::MIN, -(1i64 << 53)]),
    ];
    (base, -3i64..=3).prop_map(|(a, delta)| (a, a.saturating_add(delta)))
}

fn compare_pair(rule: &FeatureRule, a: Value, b: Value) -> FeatureOutcome {
    FeatureComparator::new(rule, NullPolicy::Same)
        .compare_values(0, Some(&a), Some(&b))
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_float_pair_matches_only_within_finite_abs_tolerance(
        a in extreme_float(),
        b in extreme_float(),
        abs in prop_oneof![Just(0.0f64), 0.0f64..10.0, Just(f64::MAX)],
    ) {
        let rule = FeatureRule::numeric("x").with_abs(abs);
        let outcome = compare_pair(&rule, Value::Float(a), Value::Float(b));
        let diff = (a - b).abs();
        let expected = a == b || (diff.is_finite() && diff <= abs);
        prop_assert_eq!(outcome.matched, expected, "{} vs {} under abs {}", a, b, abs);
    }

    #[test]
    fn test_float_pair_under_rel_tolerance_never_matches_a_different_infinity(
        a in extreme_float(),
        b in extreme_float(),
        rel in prop_oneof![Just(0.0f64), 0.0f64..1.0, Just(1e6)],
    ) {
        let rule = FeatureRule::numeric("x").with_rel(rel);
        let outcome = compare_pair(&rule, Value::Float(a), Value::Float(b));
        let diff = (a - b).abs();
        if a == b {
            prop_assert!(outcome.matched);
        } else if !a.is_finite() || !b.is_finite() || !diff.is_finite() {
            prop_assert!(!outcome.matched, "{} vs {} under rel {}", a, b, rel);
        } else if diff <= rel * a.abs().max(b.abs()) {
            prop_assert!(outcome.matched, "{} vs {} under rel {}", a, b, rel);
        }
    }

    #[test]
    fn test_integer_pair_uses_exact_difference(
        (a, b) in integer_pair(),
        abs in prop_oneof![Just(0.0f64), 0.0f64..5.0],
    ) {
        let rule = FeatureRule::numeric("x").with_abs(abs);
        let outcome = compare_pair(&rule, Value::Int(a), Value::Int(b));
        let diff = (i128::from(a) - i128::from(b)).abs();
        prop_assert_eq!(outcome.matched, diff as f64 <= abs, "{} vs {} under abs {}", a, b, abs);
        prop_assert_eq!(outcome.abs_diff, Some(diff as f64));
    }

    #[test]
    fn test_zero_abs_tolerance_matches_only_equal_values(
        a in extreme_float(),
        b in extreme_float(),
        (x, y) in integer_pair(),
    ) {
        let rule = FeatureRule::numeric("x").with_abs(0.0);
        prop_assert_eq!(
            compare_pair(&rule, Value::Float(a), Value::Float(b)).matched,
            a == b
        );
        prop_assert_eq!(compare_pair(&rule, Value::Int(x), Value::Int(y)).matched, x == y);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_identical_tables_never_skew(rows in rows_strategy()) {
        let offline = to_set("offline", &rows);
        let online = to_set("online", &rows);
        let verdict = SkewCheck::new(spec(0.0)).run(&offline, &online).unwrap();

        prop_assert_eq!(verdict.missing_in_online, 0);
        prop_assert_eq!(verdict.missing_in_offline, 0);
        prop_assert_eq!(verdict.feature("amount").unwrap().num_mismatches, 0);
        prop_assert_eq!(verdict.feature("segment").unwrap().num_mismatches, 0);
        prop_assert!(verdict.failing_features.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential(
        offline_rows in rows_strategy(),
        online_rows in rows_strategy(),
    ) {
        let offline = to_set("offline", &offline_rows);
        let online = to_set("online", &online_rows);

        let parallel_config = CheckConfig::default().with_parallel(true);
        let sequential_config = CheckConfig::default().with_parallel(false);
        let parallel = SkewCheck::with_config(spec(0.5), parallel_config)
            .run(&offline, &online)
            .unwrap();
        let sequential = SkewCheck::with_config(spec(0.5), sequential_config)
            .run(&offline, &online)
            .unwrap();
        prop_assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_wider_tolerance_never_adds_mismatches(
        offline_rows in rows_strategy(),
        online_rows in rows_strategy(),
        narrow in 0.0f64..10.0,
        extra in 0.0f64..100.0,
    ) {
        let offline = to_set("offline", &offline_rows);
        let online = to_set("online", &online_rows);

        let tight = SkewCheck::new(spec(narrow)).run(&offline, &online).unwrap();
        let loose = SkewCheck::new(spec(narrow + extra)).run(&offline, &online).unwrap();
        prop_assert!(
            loose.feature("amount").unwrap().num_mismatches
                <= tight.feature("amount").unwrap().num_mismatches
        );
        prop_assert_eq!(loose.num_pairs, tight.num_pairs);
    }

    #[test]
    fn test_missing_counts_match_key_sets(
        offline_rows in rows_strategy(),
        online_rows in rows_strategy(),
    ) {
        let offline = to_set("offline", &offline_rows);
        let online = to_set("online", &online_rows);
        let verdict = SkewCheck::new(spec(0.0)).run(&offline, &online).unwrap();

        let offline_keys: BTreeSet<i64> = offline_rows.iter().map(|r| r.id).collect();
        let online_keys: BTreeSet<i64> = online_rows.iter().map(|r| r.id).collect();
        prop_assert_eq!(verdict.num_pairs, offline_keys.intersection(&online_keys).count());
        let missing_online = offline_keys.difference(&online_keys).count();
        let missing_offline = online_keys.difference(&offline_keys).count();
        prop_assert_eq!(verdict.missing_in_online, missing_online);
        prop_assert_eq!(verdict.missing_in_offline, missing_offline);
    }

    #[test]
    fn test_merged_shards_match_single_fold(
        pairs in prop::collection::vec(
            (
                prop::option::weighted(0.8, -1_000.0f64..1_000.0),
                prop::option::weighted(0.8, -1_000.0f64..1_000.0),
            ),
            0..200,
        ),
        split in 0usize..200,
    ) {
        let (rule, outcomes) = numeric_outcomes(&pairs);
        let split = split.min(outcomes.len());

        let whole = FeatureStats::from_outcomes(&rule, &outcomes);
        let mut left = FeatureStats::from_outcomes(&rule, &outcomes[..split]);
        let right = FeatureStats::from_outcomes(&rule, &outcomes[split..]);
        left.merge(&right);

        prop_assert_eq!(left.num_rows, whole.num_rows);
        prop_assert_eq!(left.num_mismatches, whole.num_mismatches);
        prop_assert_eq!(left.null_mismatches, whole.null_mismatches);
        prop_assert_eq!(left.out_of_range_count, whole.out_of_range_count);
        prop_assert!((left.mismatch_rate - whole.mismatch_rate).abs() < 1e-12);
        match (left.mean_abs_diff, whole.mean_abs_diff) {
            (Some(a), Some(b)) => prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0)),
            (a, b) => prop_assert_eq!(a, b),
        }
    }
}

#[test]
fn test_unknown_category_alone_does_not_fail() {
    let offline = to_set(
        "offline",
        &[GeneratedRow {
            id: 1,
            amount: Some(3.0),
            segment: Some("z".into()),
        }],
    );
    let online = to_set(
        "online",
        &[GeneratedRow {
            id: 1,
            amount: Some(3.0),
            segment: Some("z".into()),
        }],
    );
    let verdict = SkewCheck::new(spec(0.0)).run(&offline, &online).unwrap();
    let segment = verdict.feature("segment").unwrap();
    assert_eq!(segment.num_mismatches, 0);
    assert_eq!(segment.unknown_category_count, Some(1));
    assert!(verdict.ok);
    assert!(segment.offline_unknown.contains("z"));
    assert!(segment.online_unknown.contains("z"));
}
