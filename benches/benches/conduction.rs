// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use std::time::Duration;
use understory_conduction::{CheckedStateCoordinator, LabelCache, LabeledValue, TopologySnapshot};

/// A complete tree with `branching` children per node, `depth` levels deep.
fn complete_tree(branching: u32, depth: u32) -> Vec<(u32, Option<u32>)> {
    let mut links = vec![(0, None)];
    let mut frontier = vec![0_u32];
    let mut next_key = 1_u32;
    for _ in 1..depth {
        let mut next = Vec::with_capacity(frontier.len() * branching as usize);
        for &parent in &frontier {
            for _ in 0..branching {
                links.push((next_key, Some(parent)));
                next.push(next_key);
                next_key += 1;
            }
        }
        frontier = next;
    }
    links
}

fn bench_build_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("conduction/build_snapshot");

    for (branching, depth) in [(4_u32, 5_u32), (8, 5), (2, 14)] {
        let links = complete_tree(branching, depth);
        group.throughput(Throughput::Elements(links.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("from_parent_links", links.len()),
            &links,
            |b, links| {
                b.iter(|| black_box(TopologySnapshot::from_parent_links(links.iter().copied())));
            },
        );
    }

    group.finish();
}

fn bench_conduct_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("conduction/conduct_check");

    // Hypothesis: both passes are linear in the number of nodes, whether the
    // input is a single root (full downward cascade) or every other leaf
    // (upward aggregation with many half-checked ancestors).
    for (branching, depth) in [(4_u32, 5_u32), (8, 5), (2, 14)] {
        let links = complete_tree(branching, depth);
        let snapshot = TopologySnapshot::from_parent_links(links.iter().copied());
        let leaves: Vec<u32> = snapshot
            .registry()
            .iter()
            .filter(|e| e.is_leaf())
            .map(|e| *e.key())
            .step_by(2)
            .collect();
        group.throughput(Throughput::Elements(links.len() as u64));

        group.bench_with_input(BenchmarkId::new("root", links.len()), &snapshot, |b, s| {
            b.iter(|| black_box(s.conduct_check([0])));
        });

        group.bench_with_input(
            BenchmarkId::new("half_of_leaves", links.len()),
            &snapshot,
            |b, s| {
                b.iter(|| black_box(s.conduct_check(leaves.iter().copied())));
            },
        );
    }

    group.finish();
}

fn bench_coordinator_clicks(c: &mut Criterion) {
    let mut group = c.benchmark_group("conduction/coordinator_clicks");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(3));

    let links = complete_tree(8, 5);
    let snapshot = TopologySnapshot::from_parent_links(links.iter().copied());
    group.throughput(Throughput::Elements(links.len() as u64));

    group.bench_function("check_then_uncheck_leaf", |b| {
        b.iter_batched(
            || CheckedStateCoordinator::new(snapshot.clone()),
            |mut coordinator| {
                coordinator.check(1);
                coordinator.uncheck(&(links.len() as u32 - 1));
                black_box(coordinator);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_label_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("conduction/label_cache");

    for len in [128_u32, 2_048] {
        let labeled: Vec<LabeledValue<u32, u32>> =
            (0..len).map(|k| LabeledValue::labeled(k, k * 10)).collect();
        let (_, cache) = LabelCache::<u32, u32>::new().memoize(labeled);
        let unlabeled: Vec<LabeledValue<u32, u32>> =
            (0..len).map(LabeledValue::unlabeled).collect();
        group.throughput(Throughput::Elements(u64::from(len)));

        group.bench_with_input(BenchmarkId::new("memoize", len), &unlabeled, |b, sel| {
            b.iter(|| black_box(cache.memoize(sel.iter().cloned())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build_snapshot,
    bench_conduct_check,
    bench_coordinator_clicks,
    bench_label_cache
);
criterion_main!(benches);
