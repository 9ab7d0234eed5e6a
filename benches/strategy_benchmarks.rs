//! Placement strategy comparison under a fragmented arena

use std::hint::black_box;
use std::ptr::NonNull;

use criterion::{Criterion, criterion_group, criterion_main};

use memory_pool::prelude::*;

const ARENA: usize = 1024 * 1024;

/// Pre-fragments a pool: a band of mixed-size allocations with every
/// other one released again, leaving a spread of holes to search.
fn fragmented_pool(strategy: AllocationStrategy) -> (MemoryPool, Vec<NonNull<u8>>) {
    let pool = MemoryPool::with_capacity(ARENA, strategy).unwrap();
    let sizes = [48, 112, 304, 80, 640, 176];
    let mut held = Vec::new();
    for round in 0..128 {
        let payload = pool.alloc(sizes[round % sizes.len()], 1).unwrap();
        held.push(payload);
    }
    let mut index = 0;
    held.retain(|payload| {
        index += 1;
        if index % 2 == 0 {
            pool.free(*payload, 1).unwrap();
            false
        } else {
            true
        }
    });
    (pool, held)
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free_churn");
    for (name, strategy) in [
        ("first_fit", AllocationStrategy::FirstFit),
        ("best_fit", AllocationStrategy::BestFit),
        ("worst_fit", AllocationStrategy::WorstFit),
        ("next_fit", AllocationStrategy::NextFit),
    ] {
        group.bench_function(name, |b| {
            let (pool, _held) = fragmented_pool(strategy);
            b.iter(|| {
                let payload = pool.alloc(black_box(96), 1).unwrap();
                pool.free(payload, 1).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_metrics_walk(c: &mut Criterion) {
    let (pool, _held) = fragmented_pool(AllocationStrategy::FirstFit);
    c.bench_function("metrics_snapshot", |b| {
        b.iter(|| black_box(pool.metrics()));
    });
}

criterion_group!(benches, bench_strategies, bench_metrics_walk);
criterion_main!(benches);
