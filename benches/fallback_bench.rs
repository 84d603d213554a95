//! Benchmarks for the rule-based fallback matcher.
//!
//! Run with: cargo bench --bench fallback_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jarvis_core::actions::ActionCatalog;
use jarvis_core::command::FallbackMatcher;
use std::sync::Arc;

fn bench_match_command(c: &mut Criterion) {
    let matcher = FallbackMatcher::new(Arc::new(ActionCatalog::builtin()), 0.5);
    let mut group = c.benchmark_group("fallback_match");

    let commands = [
        ("media", "play despacito"),
        ("ambiguous_open", "open the downloads folder"),
        ("anywhere", "hey jarvis, what's on my screen right now?"),
        ("no_match", "the quick brown fox jumps over the lazy dog"),
    ];

    for (name, command) in commands {
        group.bench_with_input(BenchmarkId::new("command", name), &command, |b, command| {
            b.iter(|| black_box(matcher.match_command(black_box(command))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_command);
criterion_main!(benches);
