//! Benchmarks for tree flattening and projection maintenance.
//!
//! Run with: cargo bench -p arbor-core

use arbor_core::{
    ExpandOptions, NodeFactory, NodeId, SourceError, Tree, TreeSource, async_trait,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use std::hint::black_box;

/// Synthetic source: every branch above the cutoff depth has `width`
/// child branches; branches at the cutoff have `width` leaves.
#[derive(Clone, Copy)]
struct FanOut {
    width: u32,
    depth: u32,
}

#[derive(Clone, Copy)]
struct Level(u32);

#[async_trait(?Send)]
impl TreeSource<Level> for FanOut {
    async fn load(
        &self,
        parent: Option<&Level>,
        factory: &mut NodeFactory<Level>,
    ) -> Result<Vec<NodeId>, SourceError> {
        let level = parent.map_or(0, |p| p.0) + 1;
        Ok((0..self.width)
            .map(|_| {
                if level < self.depth {
                    factory.create_branch(Level(level), false)
                } else {
                    factory.create_leaf(Level(level))
                }
            })
            .collect())
    }
}

fn expanded_tree(shape: FanOut) -> Tree<Level> {
    let tree = Tree::new(shape, Level(0));
    block_on(tree.expand_with(tree.root(), ExpandOptions::new().with_recursive(true)))
        .expect("fan-out source never fails");
    tree
}

// ============================================================================
// Full recursive expansion (load + connect for every branch)
// ============================================================================

fn bench_expand_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/expand_all");

    for shape in [
        FanOut { width: 10, depth: 3 },
        FanOut { width: 4, depth: 6 },
        FanOut { width: 100, depth: 2 },
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", shape.width, shape.depth)),
            &shape,
            |b, &shape| {
                b.iter(|| {
                    let tree = expanded_tree(shape);
                    black_box(tree.visible_nodes().len())
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Collapse / re-expand round trip on a fully loaded tree (pure splicing,
// no source traffic)
// ============================================================================

fn bench_collapse_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/collapse_expand");

    for shape in [
        FanOut { width: 10, depth: 3 },
        FanOut { width: 4, depth: 6 },
    ] {
        let tree = expanded_tree(shape);
        let first_branch = tree.visible_nodes()[0];

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", shape.width, shape.depth)),
            &(),
            |b, ()| {
                b.iter(|| {
                    tree.collapse(first_branch).expect("branch exists");
                    block_on(tree.expand(first_branch)).expect("already loaded");
                    black_box(tree.is_truly_expanded(first_branch))
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Snapshotting the visible sequence and materializing a render window
// ============================================================================

fn bench_visible_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/visible");

    let tree = expanded_tree(FanOut { width: 10, depth: 4 });

    group.bench_with_input(BenchmarkId::new("snapshot", "10x4"), &(), |b, ()| {
        b.iter(|| black_box(tree.visible_nodes().len()))
    });

    group.bench_with_input(BenchmarkId::new("materialize_window", "10x4"), &(), |b, ()| {
        let visible = tree.visible_nodes();
        let window = &visible[..100.min(visible.len())];
        b.iter(|| black_box(tree.materialize(window).len()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_expand_all,
    bench_collapse_expand,
    bench_visible_snapshot
);
criterion_main!(benches);
