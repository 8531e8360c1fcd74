//! Benchmarks for check compilation and an end-to-end run on DataFusion.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use datafusion::prelude::*;
use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;
use weir_guard::checks::compile_queries;
use weir_guard::config::RunOptions;
use weir_guard::core::{Check, CheckKind, Condition, Granularity};
use weir_guard::drivers::{Connections, DataFusionDriver, Driver};
use weir_guard::metric_store::InMemoryMetricStore;
use weir_guard::runner::CheckRunner;
use weir_guard::sql::Dialect;

fn grouped_check(dimensions: usize) -> Check {
    let mut builder = Check::builder("orders_total")
        .kind(CheckKind::Sum)
        .datasource("warehouse")
        .dataset("orders")
        .dataset("SELECT * FROM orders WHERE amount > 0")
        .measure("amount")
        .time_dimension("created_at", Granularity::Day)
        .condition(Condition::Ge)
        .threshold(0.0);
    for i in 0..dimensions {
        builder = builder.dimension(format!("dim_{i}"));
    }
    builder.build()
}

fn null_check(dimensions: usize) -> Check {
    let mut builder = Check::builder("orders_nulls")
        .kind(CheckKind::NotEmptyPct)
        .datasource("warehouse")
        .dataset("orders")
        .condition(Condition::Le)
        .threshold(0.1);
    for i in 0..dimensions {
        builder = builder.dimension(format!("dim_{i}"));
    }
    builder.build()
}

fn bench_compile(c: &mut Criterion) {
    let options = RunOptions::default();
    let mut group = c.benchmark_group("compile_queries");

    for dims in [1, 4, 16] {
        let grouped = grouped_check(dims);
        group.bench_with_input(BenchmarkId::new("grouped_sum", dims), &grouped, |b, check| {
            b.iter(|| {
                let queries = compile_queries(black_box(check), &options).unwrap();
                for query in &queries {
                    black_box(query.query.to_sql(Dialect::Postgres));
                }
            })
        });

        let nulls = null_check(dims);
        group.bench_with_input(BenchmarkId::new("not_empty_pct", dims), &nulls, |b, check| {
            b.iter(|| black_box(compile_queries(black_box(check), &options).unwrap()))
        });
    }
    group.finish();
}

fn bench_dialects(c: &mut Criterion) {
    let runner = CheckRunner::default();
    let check = grouped_check(2);
    let mut group = c.benchmark_group("render_dialect");

    for dialect in Dialect::ALL {
        let dialects = HashMap::from([("warehouse".to_string(), dialect)]);
        group.bench_function(dialect.name(), |b| {
            b.iter(|| {
                let checks = std::slice::from_ref(&check);
                black_box(runner.compile(checks, &dialects, Dialect::DataFusion).unwrap())
            })
        });
    }
    group.finish();
}

async fn warehouse(rows: usize) -> Connections {
    let ctx = SessionContext::new();
    let sql = format!(
        "CREATE TABLE orders AS SELECT \
            i AS id, \
            CASE WHEN i % 3 = 0 THEN 'US' ELSE 'DE' END AS country, \
            CAST(i AS DOUBLE) * 1.5 AS amount \
         FROM generate_series(1, {rows}) AS t(i)"
    );
    ctx.sql(&sql).await.unwrap().collect().await.unwrap();

    let driver = Arc::new(DataFusionDriver::new("warehouse", ctx)) as Arc<dyn Driver>;
    HashMap::from([("warehouse".to_string(), driver)])
}

fn bench_run(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let checks = vec![
        Check::builder("orders_exist")
            .kind(CheckKind::RowCount)
            .datasource("warehouse")
            .dataset("orders")
            .condition(Condition::Gt)
            .threshold(0.0)
            .build(),
        Check::builder("orders_by_country")
            .kind(CheckKind::Sum)
            .datasource("warehouse")
            .dataset("orders")
            .measure("amount")
            .dimension("country")
            .condition(Condition::Gt)
            .threshold(0.0)
            .build(),
    ];

    let mut group = c.benchmark_group("run_all");
    group.sample_size(20);
    for rows in [1_000, 100_000] {
        let connections = rt.block_on(warehouse(rows));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &connections, |b, conns| {
            b.to_async(&rt).iter(|| async {
                let store = InMemoryMetricStore::new();
                let report = CheckRunner::default()
                    .run_all("bench", &checks, conns, &store)
                    .await
                    .unwrap();
                black_box(report)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_dialects, bench_run);
criterion_main!(benches);
