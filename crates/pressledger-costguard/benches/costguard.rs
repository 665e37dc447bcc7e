//! CostGuard benchmarks
//!
//! Hot paths:
//! - Policy evaluation and costing per job
//! - Full submission into the in-memory store
//! - Cached vs. uncached statistics queries

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pressledger_common::{PolicyConfiguration, PrintJobSubmission};
use pressledger_costguard::{
    policy::PolicyEngine,
    pricing::{CostCalculator, SavingsCalculator},
    statistics::InMemoryStatisticsCache,
    store::InMemoryRecordStore,
    CostGuard,
};
use tokio::runtime::Runtime;

fn submission(i: u64) -> PrintJobSubmission {
    let pages = (i % 40 + 1) as i64;
    let color = if i % 3 == 0 { pages / 10 } else { 0 };
    PrintJobSubmission::new(
        format!("bench-{}", i),
        i % 5 + 1,
        i % 50 + 1,
        i % 4 + 1,
        pages,
        color,
        pages - color,
    )
    .with_timestamp(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(i as i64))
}

fn bench_policy_and_cost(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let config = PolicyConfiguration::default();

    group.bench_function("evaluate_and_cost", |b| {
        b.iter(|| {
            let mut record = submission(black_box(30)).validate().unwrap();
            PolicyEngine::apply(&mut record, &config);
            CostCalculator::price_record(&mut record, &config.pricing);
            black_box(SavingsCalculator::calculate(&record, &config))
        });
    });

    group.finish();
}

fn bench_submit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("submit");
    group.throughput(Throughput::Elements(1));

    let guard = CostGuard::new(
        PolicyConfiguration::default(),
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(InMemoryStatisticsCache::default()),
    )
    .unwrap();

    let mut i = 0u64;
    group.bench_function("submit_job", |b| {
        b.iter(|| {
            i += 1;
            rt.block_on(guard.submit_job(submission(i))).unwrap()
        });
    });

    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("statistics");
    group.measurement_time(Duration::from_secs(10));

    for jobs in [1_000u64, 10_000].iter() {
        let guard = CostGuard::new(
            PolicyConfiguration::default(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryStatisticsCache::default()),
        )
        .unwrap();
        rt.block_on(async {
            for i in 0..*jobs {
                guard.submit_job(submission(i)).await.unwrap();
            }
        });

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        group.bench_with_input(BenchmarkId::new("by_department_cached", jobs), jobs, |b, _| {
            b.iter(|| rt.block_on(guard.by_department(start, end)).unwrap());
        });

        let mut offset = 0i64;
        group.bench_with_input(BenchmarkId::new("by_department_uncached", jobs), jobs, |b, _| {
            b.iter(|| {
                // fresh window each iteration
                offset += 1;
                let end = end + chrono::Duration::seconds(offset);
                rt.block_on(guard.by_department(start, end)).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_policy_and_cost, bench_submit, bench_statistics);
criterion_main!(benches);
