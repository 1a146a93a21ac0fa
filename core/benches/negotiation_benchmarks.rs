//! MIME negotiation and format resolution benchmarks
//!
//! Negotiation runs on every request that sends an `Accept` header, so it
//! should stay well under a microsecond for typical browser headers.
//!
//! Run with: `cargo bench --bench negotiation_benchmarks`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use composable_action_core::format::{self, FormatHints, FormatRegistry};
use composable_action_core::negotiation::{accepts, best_match, parse_accept};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const BROWSER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const WEIGHTED: &str = "application/json;q=0.6,application/xml;q=0.9,*/*;q=0.8";
const SUPPORTED: [&str; 3] = ["application/json", "application/xml", "text/html"];

fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_accept");
    group.throughput(Throughput::Elements(1));

    group.bench_function("browser_header", |b| {
        b.iter(|| black_box(parse_accept(black_box(Some(BROWSER)))));
    });

    group.bench_function("absent_header", |b| {
        b.iter(|| black_box(parse_accept(black_box(None))));
    });

    group.finish();
}

fn benchmark_best_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_match");
    group.throughput(Throughput::Elements(1));

    group.bench_function("browser_three_candidates", |b| {
        b.iter(|| black_box(best_match(black_box(Some(BROWSER)), &SUPPORTED)));
    });

    group.bench_function("weighted_three_candidates", |b| {
        b.iter(|| black_box(best_match(black_box(Some(WEIGHTED)), &SUPPORTED)));
    });

    let registry = FormatRegistry::new();
    let known = registry.mime_types();
    group.bench_function("browser_full_registry", |b| {
        b.iter(|| black_box(best_match(black_box(Some(BROWSER)), &known)));
    });

    group.bench_function("accepts_single", |b| {
        b.iter(|| black_box(accepts(black_box(Some(BROWSER)), "application/json")));
    });

    group.finish();
}

fn benchmark_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_resolve");
    let registry = FormatRegistry::new();
    let accepted = vec!["json".to_string(), "html".to_string()];

    group.bench_function("accepted_formats", |b| {
        b.iter(|| {
            black_box(
                format::resolve(
                    &registry,
                    FormatHints {
                        accept: Some(BROWSER),
                        accepted: &accepted,
                        ..FormatHints::default()
                    },
                )
                .expect("formats are registered"),
            )
        });
    });

    group.bench_function("path_extension", |b| {
        b.iter(|| {
            black_box(
                format::resolve(
                    &registry,
                    FormatHints {
                        extension: Some("json"),
                        accept: Some(BROWSER),
                        ..FormatHints::default()
                    },
                )
                .expect("formats are registered"),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_parse, benchmark_best_match, benchmark_resolve);
criterion_main!(benches);
