//! Routing throughput on fixture trees.
//!
//! Measures one all-to-one sweep (every access node toward `acc5`) per
//! algorithm, with and without a handful of failed links.

use arbor_routing::{fixtures, Algorithm, FailureSet, RoutingEngine};
use clos_fabric::{ClosTopology, EdgeId, Variant};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use design_schedule::DesignSchedule;
use std::sync::Arc;

const FAN_OUT: usize = 16;
const TREES: usize = 4;

fn engine(fabric: &Arc<ClosTopology>) -> RoutingEngine {
    let rows: Vec<Vec<usize>> = (0..TREES)
        .map(|r| (0..TREES).map(|c| (r + c) % TREES).collect())
        .collect();
    RoutingEngine::new(
        Arc::clone(fabric),
        Arc::new(fixtures::arborescences(fabric, TREES).unwrap()),
    )
    .unwrap()
    .with_schedule(Arc::new(DesignSchedule::from_rows(rows).unwrap()))
    .unwrap()
    .with_paths(Arc::new(fixtures::square_one_paths(fabric).unwrap()))
    .unwrap()
}

fn bench_sweep(c: &mut Criterion) {
    let fabric = Arc::new(ClosTopology::new(FAN_OUT).unwrap());
    let engine = engine(&fabric);
    let map = fabric.relabel(5, Variant::RotatedCore).unwrap();
    let destination = fabric.access(5);

    let scenarios = [
        ("clean", FailureSet::empty(&fabric)),
        (
            "failed",
            FailureSet::from_edge_ids(&fabric, (0..fabric.edge_count() as u32).step_by(37).map(EdgeId))
                .unwrap(),
        ),
    ];

    let mut group = c.benchmark_group("all_to_one");
    for (label, failures) in &scenarios {
        for algorithm in Algorithm::ALL {
            group.bench_with_input(
                BenchmarkId::new(algorithm.name(), label),
                &algorithm,
                |b, &algorithm| {
                    b.iter(|| {
                        let mut hops = 0;
                        for s in (0..fabric.access_count()).filter(|&s| s != 5) {
                            let outcome = engine
                                .route(algorithm, fabric.access(s), destination, failures, &map)
                                .unwrap();
                            hops += outcome.hop_count();
                        }
                        black_box(hops)
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
