//! Benchmarks for change propagation through the reactive graph.
//!
//! Run with: cargo bench -p formwork-reactive

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use formwork_reactive::{Computed, Runtime, Value};
use std::hint::black_box;

/// A chain of `depth` computed cells, each adding one to the previous.
fn make_chain(rt: &Runtime, depth: usize) -> (Value<u64>, Computed<u64>) {
    let source = rt.value(0u64);
    let sc = source.clone();
    let mut tail = rt.computed(move || sc.get());
    for _ in 0..depth {
        tail = tail.map(|v| v + 1);
    }
    (source, tail)
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/computed_chain");

    for depth in [1, 10, 100] {
        let rt = Runtime::new();
        let (source, tail) = make_chain(&rt, depth);
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("set_then_get", depth), &depth, |b, _| {
            b.iter(|| {
                next += 1;
                source.set(next);
                black_box(tail.get())
            })
        });
    }

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/fan_out");

    for width in [10, 100, 1000] {
        let rt = Runtime::new();
        let source = rt.value(0u64);
        let reactions: Vec<_> = (0..width)
            .map(|_| {
                let sc = source.clone();
                rt.autorun(move || {
                    black_box(sc.get());
                })
            })
            .collect();
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("action", width), &width, |b, _| {
            b.iter(|| {
                next += 1;
                rt.run_in_action(|| source.set(next));
            })
        });
        drop(reactions);
    }

    group.finish();
}

fn bench_batched_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/batched_writes");

    for writes in [1, 10, 100] {
        let rt = Runtime::new();
        let cells: Vec<Value<u64>> = (0..writes).map(|_| rt.value(0)).collect();
        let readers = cells.clone();
        let _sum = rt.autorun(move || {
            black_box(readers.iter().map(Value::get).sum::<u64>());
        });
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("writes", writes), &writes, |b, _| {
            b.iter(|| {
                next += 1;
                rt.run_in_action(|| {
                    for cell in &cells {
                        cell.set(next);
                    }
                });
            })
        });
    }

    group.finish();
}

fn bench_array_index_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/array");

    for len in [10, 100, 1000] {
        let rt = Runtime::new();
        let arr = rt.array(0..len as u64);
        let reader = arr.clone();
        let first = rt.computed(move || reader.get(0));
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("set_last", len), &len, |b, &len| {
            b.iter(|| {
                next += 1;
                let _ = arr.set(len - 1, next);
                black_box(first.get())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_computed_chain,
    bench_fan_out,
    bench_batched_writes,
    bench_array_index_write
);
criterion_main!(benches);
