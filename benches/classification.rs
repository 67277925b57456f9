//! Benchmarks for classification against large lists.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pangrosan::priority::{ListKind, PriorityList};
use pangrosan::ClassificationEngine;
use std::hint::black_box;

/// Spread-out /32 entries
fn specific_ips(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| {
            let a = 1 + (i % 200) as u8;
            let b = ((i / 200) % 256) as u8;
            let c = ((i / 51200) % 256) as u8;
            (format!("{}.{}.{}.7", a, b, c), "bench feed".to_string())
        })
        .collect()
}

/// CIDRs with prefix lengths 16-24
fn segments(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| {
            let a = 1 + (i % 200) as u8;
            let b = ((i / 200) % 256) as u8;
            let prefix = 16 + (i % 9);
            (format!("{}.{}.0.0/{}", a, b, prefix), "bench drop".to_string())
        })
        .collect()
}

fn domains(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| (format!("host{}.bench{}.example", i, i % 97), "bench".to_string()))
        .collect()
}

fn engine(size: usize) -> ClassificationEngine {
    let build = |kind, pairs| PriorityList::build(kind, pairs).unwrap();
    ClassificationEngine::new(vec![
        build(ListKind::BlacklistIpSpecific, specific_ips(size)),
        build(ListKind::BlacklistIpSegment, segments(size)),
        build(ListKind::BlacklistDomain, domains(size)),
    ])
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for size in [1_000, 10_000, 50_000] {
        let engine = engine(size);
        group.bench_with_input(BenchmarkId::new("ip_hit", size), &engine, |b, e| {
            b.iter(|| e.classify(black_box("5.0.0.7")))
        });
        group.bench_with_input(BenchmarkId::new("ip_miss", size), &engine, |b, e| {
            b.iter(|| e.classify(black_box("250.1.2.3")))
        });
        group.bench_with_input(BenchmarkId::new("domain_suffix", size), &engine, |b, e| {
            b.iter(|| e.classify(black_box("cdn.host42.bench42.example")))
        });
    }

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [1_000, 10_000] {
        let pairs = segments(size);
        group.bench_with_input(BenchmarkId::new("segments", size), &pairs, |b, pairs| {
            b.iter(|| PriorityList::build(ListKind::BlacklistIpSegment, pairs.clone()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_build);
criterion_main!(benches);
