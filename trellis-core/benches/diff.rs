//! Keyed reconciliation throughput over a no-op platform adapter, isolating
//! differ cost from realized-tree cost.

use std::cell::Cell;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use trellis_core::render::{Platform, PropValue, Renderer, Root, VNode};

struct NullPlatform {
    next: Cell<usize>,
}

impl NullPlatform {
    fn new() -> Self {
        Self { next: Cell::new(1) }
    }
}

impl Platform for NullPlatform {
    type Node = usize;

    fn create_element(&self, _tag: &str) -> usize {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }

    fn create_text(&self, _content: &str) -> usize {
        self.create_element("")
    }

    fn create_comment(&self, _content: &str) -> usize {
        self.create_element("")
    }

    fn set_element_text(&self, _el: &usize, _content: &str) {}
    fn set_text(&self, _node: &usize, _content: &str) {}
    fn set_comment(&self, _node: &usize, _content: &str) {}
    fn insert(&self, _child: &usize, _parent: &usize, _anchor: Option<&usize>) {}
    fn remove(&self, _node: &usize) {}
    fn patch_prop(&self, _el: &usize, _key: &str, _old: Option<&PropValue>, _new: Option<&PropValue>) {}
}

fn keyed(keys: impl Iterator<Item = i64>) -> VNode<usize> {
    VNode::element("ul").children(
        keys.map(|k| VNode::element("li").key(k).text_children(k.to_string()))
            .collect(),
    )
}

fn bench_keyed_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_children");

    for &n in &[100i64, 1_000] {
        group.bench_function(format!("reverse_{n}"), |b| {
            b.iter_batched(
                || {
                    let renderer = Renderer::new(NullPlatform::new());
                    let container = 0usize;
                    let mut root = Root::new();
                    renderer.render(&mut root, Some(keyed(0..n)), &container);
                    (renderer, root, container)
                },
                |(renderer, mut root, container)| {
                    renderer.render(&mut root, Some(keyed((0..n).rev())), &container);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("shift_rotate_{n}"), |b| {
            b.iter_batched(
                || {
                    let renderer = Renderer::new(NullPlatform::new());
                    let container = 0usize;
                    let mut root = Root::new();
                    renderer.render(&mut root, Some(keyed(0..n)), &container);
                    (renderer, root, container)
                },
                |(renderer, mut root, container)| {
                    // Rotate by one: worst case for naive diffing, one move
                    // for the fast path.
                    renderer.render(
                        &mut root,
                        Some(keyed((1..n).chain(std::iter::once(0)))),
                        &container,
                    );
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("identical_{n}"), |b| {
            b.iter_batched(
                || {
                    let renderer = Renderer::new(NullPlatform::new());
                    let container = 0usize;
                    let mut root = Root::new();
                    renderer.render(&mut root, Some(keyed(0..n)), &container);
                    (renderer, root, container)
                },
                |(renderer, mut root, container)| {
                    renderer.render(&mut root, Some(keyed(0..n)), &container);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_keyed_diff);
criterion_main!(benches);
