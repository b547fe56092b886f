//! Tag propagation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use depsgraph_core::graph::Depsgraph;
use depsgraph_core::id::{Id, IdRef, IdType};
use depsgraph_core::nodes::NodeKind;

const COMPONENTS: [NodeKind; 4] = [
    NodeKind::Transform,
    NodeKind::Geometry,
    NodeKind::Animation,
    NodeKind::Shading,
];

/// `objects` data-blocks, each with a few components and operations, all
/// depending on time.
fn scene(objects: usize) -> (Depsgraph, Vec<IdRef>) {
    let mut graph = Depsgraph::new();
    let time = graph.time_source();
    let mut ids = Vec::with_capacity(objects);

    for i in 0..objects {
        let id = Id::new(IdType::Object, format!("Object.{i:04}")).into_ref();
        let node = graph.add_id_node(&id);
        for kind in COMPONENTS {
            let component = graph.add_component(node, kind, "");
            graph.add_operation(component, "Eval");
            graph.add_operation(component, "Done");
        }
        let transform = graph.add_component(node, NodeKind::Transform, "");
        graph.add_relation(time, transform, "Time -> Transform");
        ids.push(id);
    }

    graph.finalize_build();
    (graph, ids)
}

fn bench_time_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("tag_time_source");
    for objects in [10, 100, 1000] {
        let (mut graph, _ids) = scene(objects);
        group.bench_with_input(BenchmarkId::from_parameter(objects), &objects, |b, _| {
            b.iter(|| {
                graph.tag_time_source();
                black_box(graph.entry_tags().len());
                graph.clear_tags();
            })
        });
    }
    group.finish();
}

fn bench_tag_id(c: &mut Criterion) {
    let (mut graph, ids) = scene(100);
    c.bench_function("tag_id", |b| {
        b.iter(|| {
            for id in &ids {
                graph.tag_id(black_box(id));
            }
            graph.clear_tags();
        })
    });
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_100_objects", |b| b.iter(|| black_box(scene(100))));
}

criterion_group!(benches, bench_time_source, bench_tag_id, bench_build);
criterion_main!(benches);
