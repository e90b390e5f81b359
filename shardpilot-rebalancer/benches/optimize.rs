//! Optimizer throughput benchmark
//!
//! One full optimization pass over a skewed synthetic cluster. `optimize`
//! restores the shard table, so the same model is reused across
//! iterations.

use std::collections::HashSet;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use shardpilot_cluster::ClusterModel;
use shardpilot_rebalancer::{CandidateFlags, Optimizer, OptimizerConfig};

fn skewed_cluster(servers: usize, collections: usize, shards: usize) -> ClusterModel {
    let mut model = ClusterModel::new();
    model.add_zone("z1");
    for i in 0..servers {
        model.add_server(format!("node{i:02}"), 512 << 30, 0, 1.0, "z1");
    }
    model.create_database("bench", 1.0);
    for c in 0..collections {
        let id = model
            .create_collection(format!("c{c}"), "bench", shards, 3, 1.0)
            .unwrap();
        for (i, shard_id) in model.collection(id).unwrap().shards.clone().iter().enumerate() {
            model.shard_mut(*shard_id).unwrap().size = ((i as u64 % 16) + 1) << 28;
        }
    }

    let probabilities: Vec<f64> = (0..servers).map(|i| (i + 1) as f64).collect();
    let mut rng = StdRng::seed_from_u64(0);
    model
        .distribute_shards_randomly(&probabilities, &mut rng)
        .unwrap();
    model
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");

    for (servers, collections, shards) in [(5, 4, 16), (10, 8, 32)] {
        let model = skewed_cluster(servers, collections, shards);
        let healthy: HashSet<usize> = (0..servers).collect();
        let optimizer = Optimizer::new(OptimizerConfig::default());

        group.bench_function(
            format!("{servers}srv_{collections}x{shards}shards"),
            |b| {
                b.iter_batched(
                    || model.clone(),
                    |mut model| {
                        optimizer
                            .optimize(&mut model, &healthy, CandidateFlags::all(), 64)
                            .unwrap()
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
