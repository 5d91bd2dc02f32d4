//! Benchmarks for alignment, comparison and record loading.

use arrow::array::{Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use datafusion::prelude::*;
use skew_guard::core::{
    align, CheckConfig, FeatureRule, FeatureSpec, RecordSet, SkewCheck, Value,
};
use skew_guard::sources::{FeatureSource, SqlSource};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_spec() -> FeatureSpec {
    FeatureSpec::builder()
        .key("user_id")
        .feature(FeatureRule::numeric("spend_7d").with_abs(0.01).with_rel(0.01))
        .feature(FeatureRule::numeric("sessions").with_range(0.0, 500.0))
        .feature(FeatureRule::categorical("country").with_allowed(["US", "UK", "DE", "FR"]))
        .feature(FeatureRule::exact("is_active"))
        .build()
        .unwrap()
}

/// Builds offline/online record sets with roughly 1% numeric drift and the
/// online side shuffled relative to the offline side.
fn create_record_sets(rows: usize) -> (RecordSet, RecordSet) {
    let columns = vec!["user_id", "spend_7d", "sessions", "country", "is_active"];
    let countries = ["US", "UK", "DE", "FR", "BR"];
    let mut offline = RecordSet::new("offline", columns.clone()).unwrap();
    let mut online = RecordSet::new("online", columns).unwrap();

    for i in 0..rows {
        let spend = (i % 1000) as f64 * 1.25;
        offline
            .push_row(vec![
                Value::Int(i as i64),
                Value::Float(spend),
                Value::Int((i % 600) as i64),
                Value::from(countries[i % 4]),
                Value::Bool(i % 3 == 0),
            ])
            .unwrap();
    }
    for j in 0..rows {
        let i = (j * 7919) % rows;
        let spend = (i % 1000) as f64 * 1.25;
        let drift = if i % 100 == 0 { 5.0 } else { 0.0 };
        online
            .push_row(vec![
                Value::Int(i as i64),
                Value::Float(spend + drift),
                Value::Int((i % 600) as i64),
                Value::from(countries[i % 5]),
                Value::Bool(i % 3 == 0),
            ])
            .unwrap();
    }
    (offline, online)
}

fn create_feature_context(rows: usize) -> SessionContext {
    let schema = Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("spend_7d", DataType::Float64, true),
        Field::new("country", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from((0..rows as i64).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(
                (0..rows).map(|i| i as f64 * 0.5).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                (0..rows).map(|i| format!("c{}", i % 8)).collect::<Vec<_>>(),
            )),
        ],
    )
    .unwrap();

    let ctx = SessionContext::new();
    ctx.register_batch("features", batch).unwrap();
    ctx
}

fn bench_alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("alignment");
    let keys = vec!["user_id".to_string()];

    for rows in [1_000, 10_000, 100_000] {
        let (offline, online) = create_record_sets(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| black_box(align(&offline, &online, &keys).unwrap().num_pairs()))
        });
    }
    group.finish();
}

fn bench_full_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_check");
    group.sample_size(20);

    for rows in [10_000, 100_000] {
        let (offline, online) = create_record_sets(rows);
        group.throughput(Throughput::Elements(rows as u64));

        let parallel = SkewCheck::with_config(bench_spec(), CheckConfig::default());
        group.bench_with_input(BenchmarkId::new("parallel", rows), &rows, |b, _| {
            b.iter(|| black_box(parallel.run(&offline, &online).unwrap()))
        });

        let sequential =
            SkewCheck::with_config(bench_spec(), CheckConfig::default().with_parallel(false));
        group.bench_with_input(BenchmarkId::new("sequential", rows), &rows, |b, _| {
            b.iter(|| black_box(sequential.run(&offline, &online).unwrap()))
        });
    }
    group.finish();
}

fn bench_sql_load(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sql_load");
    group.sample_size(20);

    for rows in [10_000, 100_000] {
        let source = SqlSource::new(
            "offline",
            create_feature_context(rows),
            "SELECT user_id, spend_7d, country FROM features",
        );
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| rt.block_on(async { black_box(source.load().await.unwrap().len()) }))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_alignment, bench_full_check, bench_sql_load);
criterion_main!(benches);
