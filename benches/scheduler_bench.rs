//! Benchmarks for the hot paths of a monitoring cycle.
//!
//! Benchmarks cover:
//! - Batch scheduling over large primary sets, with and without promoted SKUs
//! - Batch result accounting (unload counters)
//! - Keyword compilation and evaluation
//! - Snapshot matching against persisted state
//! - Uncontended proxy lease/release

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use restock_sentinel::core::{
    AvailableSize, KeywordQuery, Lease, MatchPolicy, PoolSettings, ProductSnapshot, ProductStates,
    Proxy, ProxyPool, SchedulerSettings, SharedStates, SkuQuery, SkuScheduler, StateMatcher,
};
use tokio_util::sync::CancellationToken;

fn primary(n: usize) -> Vec<SkuQuery> {
    (0..n).map(|i| SkuQuery::new(format!("SKU{i:05}"))).collect()
}

// ============================================================================
// Scheduler
// ============================================================================

fn bench_next_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_next_batch");
    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(50));
        group.bench_with_input(BenchmarkId::new("primary_only", size), &size, |b, &size| {
            let mut scheduler = SkuScheduler::new(SchedulerSettings::default(), primary(size));
            b.iter(|| black_box(scheduler.next_batch()));
        });
        group.bench_with_input(BenchmarkId::new("with_promoted", size), &size, |b, &size| {
            let mut scheduler = SkuScheduler::new(SchedulerSettings::default(), primary(size));
            for i in 0..10 {
                scheduler.promote(SkuQuery::new(format!("NEW{i}")));
            }
            b.iter(|| black_box(scheduler.next_batch()));
        });
    }
    group.finish();
}

fn bench_record_batch_result(c: &mut Criterion) {
    let mut scheduler = SkuScheduler::new(SchedulerSettings::default(), primary(1_000));
    let requested = scheduler.next_batch();
    let observed: Vec<SkuQuery> = requested.iter().step_by(2).cloned().collect();

    c.bench_function("scheduler_record_batch_result", |b| {
        b.iter(|| black_box(scheduler.record_batch_result(&requested, &observed)));
    });
}

// ============================================================================
// Keyword queries
// ============================================================================

fn bench_keywords(c: &mut Criterion) {
    let raw = "+jordan 1 -kids -gs /red/blue/black +high";
    c.bench_function("keyword_compile", |b| {
        b.iter(|| black_box(KeywordQuery::compile(black_box(raw))));
    });

    let query = KeywordQuery::compile(raw);
    let identifier = "nike air jordan 1 retro high og black white university red";
    c.bench_function("keyword_match", |b| {
        b.iter(|| black_box(query.matches(black_box(identifier))));
    });
}

// ============================================================================
// State matching
// ============================================================================

fn bench_match_snapshot(c: &mut Criterion) {
    let mut states = ProductStates::default();
    states.normal.sku_queries.push("DD1391-100".into());
    let matcher = StateMatcher::new(SharedStates::new(states), MatchPolicy::default());
    let snapshot = ProductSnapshot {
        sku: "DD1391-100".into(),
        available_for_sale: true,
        available_sizes: (36..48).map(|s| AvailableSize::new(format!("EU {s}"), 3)).collect(),
        price: "119.99".into(),
        ..ProductSnapshot::default()
    };
    matcher.match_snapshot(&snapshot, true);

    c.bench_function("match_snapshot_unchanged", |b| {
        b.iter(|| black_box(matcher.match_snapshot(black_box(&snapshot), false)));
    });
}

// ============================================================================
// Proxy pool
// ============================================================================

fn bench_lease_release(c: &mut Criterion) {
    let proxies = (0..20)
        .map(|i| Proxy::parse_line(&format!("10.0.0.{i}:8080:user:pass")))
        .collect::<Result<Vec<_>, _>>()
        .expect("valid proxy lines");
    let pool = ProxyPool::new("bench", proxies, PoolSettings::default(), None);
    let token = CancellationToken::new();

    c.bench_function("proxy_lease_release", |b| {
        b.iter(|| {
            if let Lease::Granted(proxy) = pool.lease(&token) {
                pool.release(black_box(&proxy));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_next_batch,
    bench_record_batch_result,
    bench_keywords,
    bench_match_snapshot,
    bench_lease_release
);
criterion_main!(benches);
