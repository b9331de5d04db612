//! Benchmarks for containment queries over large boards.
//!
//! Run with: cargo bench -p taskcanvas-board

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use taskcanvas_board::{Bounds, ContainmentResolver, ContainmentRule, GroupIndex, GroupRect, Point};
use taskcanvas_core::NodeId;
use taskcanvas_settings::ContainmentSettings;

/// Grid of `n` top-level groups, each holding one nested child group.
fn make_index(n: usize) -> GroupIndex {
    let mut index = GroupIndex::default();
    let columns = (n as f64).sqrt().ceil() as usize;
    for i in 0..n {
        let origin = Point::new((i % columns) as f64 * 700.0, (i / columns) as f64 * 700.0);
        let outer = NodeId::new(format!("outer-{i}"));
        index.insert(GroupRect {
            id: outer.clone(),
            bounds: Bounds::from_origin(origin, 600.0, 600.0),
            parent_id: None,
        });
        index.insert(GroupRect {
            id: NodeId::new(format!("inner-{i}")),
            bounds: Bounds::from_origin(origin + Point::new(50.0, 50.0), 250.0, 250.0),
            parent_id: Some(outer),
        });
    }
    index
}

fn bench_smallest_containing(c: &mut Criterion) {
    let mut group = c.benchmark_group("containment/smallest_containing");
    let resolver = ContainmentResolver::new(ContainmentSettings::default());
    let item = Bounds::from_origin(Point::new(100.0, 100.0), 200.0, 80.0);

    for n in [10, 100, 1000] {
        let index = make_index(n);
        group.bench_with_input(BenchmarkId::new("center", n), &index, |b, index| {
            b.iter(|| {
                black_box(resolver.find_smallest_containing(
                    black_box(&item),
                    index,
                    ContainmentRule::Center,
                ))
            })
        });
    }

    group.finish();
}

fn bench_group_parent(c: &mut Criterion) {
    let mut group = c.benchmark_group("containment/select_group_parent");
    let resolver = ContainmentResolver::new(ContainmentSettings::default());
    let moved = NodeId::new("inner-0");
    let bounds = Bounds::from_origin(Point::new(120.0, 120.0), 250.0, 250.0);

    for n in [10, 100, 1000] {
        let index = make_index(n);
        group.bench_with_input(BenchmarkId::new("overlap", n), &index, |b, index| {
            b.iter(|| black_box(resolver.select_group_parent(&moved, black_box(&bounds), index)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_smallest_containing, bench_group_parent);
criterion_main!(benches);
