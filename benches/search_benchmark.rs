use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{thread_rng, Rng};
use stay_search::booking::{resolve_mode, OfferIdAndQuantity};
use stay_search::search_params::parse_from_query;
use stay_search::search_sync::SearchStateSync;

fn query(location: &str, day: u32) -> HashMap<String, String> {
    [
        ("location", location.to_string()),
        ("arrival", format!("2025-06-{:02}", day)),
        ("departure", format!("2025-06-{:02}", day + 2)),
        ("roomCount", "2".to_string()),
        ("adultCount", "3".to_string()),
        ("childCount", "1".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

// Query parsing runs on every navigation
pub fn parse_benchmark(c: &mut Criterion) {
    let complete = query("Berlin", 10);
    let mut incomplete = complete.clone();
    incomplete.remove("adultCount");

    let mut group = c.benchmark_group("parse_from_query");
    group.bench_function("complete", |b| {
        b.iter(|| parse_from_query(black_box(&complete)))
    });
    group.bench_function("incomplete", |b| {
        b.iter(|| parse_from_query(black_box(&incomplete)))
    });
    group.finish();
}

pub fn booking_mode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_mode");

    for offers in [1usize, 10, 100].iter() {
        let mut rng = thread_rng();
        let selection: Vec<OfferIdAndQuantity> = (0..*offers)
            .map(|i| OfferIdAndQuantity::new(format!("offer{}", i), rng.gen_range(0..4)))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(offers), &selection, |b, selection| {
            b.iter(|| resolve_mode(Some(black_box(selection.as_slice())), 9))
        });
    }
    group.finish();
}

// Rapid re-submissions across a handful of destinations
pub fn sync_benchmark(c: &mut Criterion) {
    let locations = ["Berlin", "Paris", "Rome", "Oslo"];
    let queries: Vec<_> = (0..100)
        .map(|i| query(locations[i % locations.len()], 1 + (i % 20) as u32))
        .collect();

    c.bench_function("search_state_sync_1000_navigations", |b| {
        b.iter(|| {
            let mut sync = SearchStateSync::new();
            let mut rng = thread_rng();
            for _ in 0..1000 {
                let query = &queries[rng.gen_range(0..queries.len())];
                black_box(sync.load_from_query(query));
            }
        })
    });
}

criterion_group!(benches, parse_benchmark, booking_mode_benchmark, sync_benchmark);
criterion_main!(benches);
