//! End-to-end optimizer scenarios
//!
//! Builds small clusters, runs full optimization passes, and checks the
//! plan contract: positive non-increasing scores, the `at_most` bound,
//! the shard-table restore guarantee, and that applying the plan actually
//! reduces imbalance.

use std::collections::HashSet;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use shardpilot_cluster::{ClusterModel, Shard, ShardId};
use shardpilot_rebalancer::{
    applier, CandidateFlags, LeaderImbalance, Optimizer, OptimizerConfig, RebalancePlan,
    ShardImbalance,
};

const PI: f64 = 256e6;
const GIB: u64 = 1 << 30;

fn equal_servers(n: usize) -> ClusterModel {
    let mut model = ClusterModel::new();
    model.add_zone("z1");
    for i in 0..n {
        model.add_server(format!("node{i}"), 1_000_000, 1_000_000, 1.0, "z1");
    }
    model.create_database("app", 1.0);
    model
}

fn all_healthy(model: &ClusterModel) -> HashSet<usize> {
    (0..model.servers().len()).collect()
}

fn shard_tables_equal(a: &[Shard], b: &[Shard]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.leader == y.leader && x.followers == y.followers)
}

/// Commit every job of a plan against the model, returning final metrics
fn apply_plan(model: &mut ClusterModel, plan: &RebalancePlan) -> (ShardImbalance, LeaderImbalance) {
    let mut shard_imb = ShardImbalance::compute(model);
    let mut leader_imb = LeaderImbalance::compute(model, PI);
    for job in &plan.jobs {
        applier::commit(model, &mut shard_imb, &mut leader_imb, job, PI).unwrap();
    }
    (shard_imb, leader_imb)
}

fn assert_plan_contract(plan: &RebalancePlan, at_most: usize) {
    assert!(plan.len() <= at_most);
    let mut previous = f64::INFINITY;
    for job in &plan.jobs {
        assert!(job.score > 0.0, "plan contains non-positive score");
        assert!(job.score <= previous, "plan scores increase");
        assert_ne!(job.from, job.to);
        previous = job.score;
    }
}

#[test]
fn concentrated_leaders_get_spread() {
    // 3 equal servers, one collection of 4 shards, rf=1, everything on
    // server 0.
    let mut model = equal_servers(3);
    model.create_collection("c", "app", 4, 1, 1.0).unwrap();
    for i in 0..4 {
        let shard = model.shard_mut(ShardId(i)).unwrap();
        shard.size = GIB;
        shard.leader = 0;
    }

    let baseline = ShardImbalance::compute(&model);
    assert!(baseline.imbalance > 0.0);

    let before = model.snapshot_shards();
    let healthy = all_healthy(&model);
    let optimizer = Optimizer::new(OptimizerConfig::default());
    let plan = optimizer
        .optimize(&mut model, &healthy, CandidateFlags::all(), 10)
        .unwrap();

    // The optimizer must leave the model as it found it.
    assert!(shard_tables_equal(&before, &model.snapshot_shards()));
    assert_plan_contract(&plan, 10);
    assert!(!plan.is_empty());
    assert!(plan.jobs.iter().all(|j| j.is_leader && j.moves_data));

    let (after, _) = apply_plan(&mut model, &plan);
    assert!(after.imbalance < baseline.imbalance);
    // 4 shards over 3 servers: nobody keeps more than 2.
    assert!(after.number_shards.iter().all(|n| *n <= 2));
    assert!(after.size_used.iter().all(|used| *used <= 2.0 * GIB as f64));
}

#[test]
fn fully_replicated_cluster_rebalances_by_promotion() {
    // rf=3 on exactly 3 servers: every server holds every shard, so only
    // leader/follower swaps are possible.
    let mut model = equal_servers(3);
    model.create_collection("c", "app", 6, 3, 1.0).unwrap();
    for i in 0..6 {
        let shard = model.shard_mut(ShardId(i)).unwrap();
        shard.size = GIB;
        shard.leader = 0;
        shard.followers = vec![1, 2];
    }

    let baseline = LeaderImbalance::compute(&model, PI);
    assert!(baseline.imbalance > 0.0);

    let healthy = all_healthy(&model);
    let optimizer = Optimizer::new(OptimizerConfig::default());
    let plan = optimizer
        .optimize(&mut model, &healthy, CandidateFlags::all(), 10)
        .unwrap();

    assert_plan_contract(&plan, 10);
    assert!(!plan.is_empty());
    assert!(plan.jobs.iter().all(|j| j.is_leader && !j.moves_data));

    let (_, leaders_after) = apply_plan(&mut model, &plan);
    assert!(leaders_after.imbalance < baseline.imbalance);
}

#[test]
fn replica_counts_survive_the_plan() {
    let mut model = equal_servers(5);
    model.create_collection("c0", "app", 8, 3, 1.0).unwrap();
    model.create_collection("c1", "app", 4, 2, 2.0).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    for id in 0..12u32 {
        model.shard_mut(ShardId(id)).unwrap().size = (100 + 37 * id as u64) << 20;
    }
    model
        .distribute_shards_randomly(&[5.0, 1.0, 1.0, 1.0, 1.0], &mut rng)
        .unwrap();

    let followers_before: Vec<usize> = model.shards().iter().map(|s| s.followers.len()).collect();

    let healthy = all_healthy(&model);
    let optimizer = Optimizer::new(OptimizerConfig::default());
    let plan = optimizer
        .optimize(&mut model, &healthy, CandidateFlags::all(), 20)
        .unwrap();
    apply_plan(&mut model, &plan);

    let followers_after: Vec<usize> = model.shards().iter().map(|s| s.followers.len()).collect();
    assert_eq!(followers_before, followers_after);
    for shard in model.shards() {
        assert!(!shard.followers.contains(&shard.leader));
    }
    for collection in model.collections() {
        assert!(!collection.shards.is_empty());
    }
}

#[test]
fn at_most_bounds_the_plan() {
    let mut model = equal_servers(4);
    model.create_collection("c", "app", 16, 2, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    for id in 0..16u32 {
        model.shard_mut(ShardId(id)).unwrap().size = (50 * (id as u64 + 1)) << 20;
    }
    model
        .distribute_shards_randomly(&[10.0, 1.0, 1.0, 1.0], &mut rng)
        .unwrap();

    let healthy = all_healthy(&model);
    let optimizer = Optimizer::new(OptimizerConfig::default());
    let plan = optimizer
        .optimize(&mut model, &healthy, CandidateFlags::all(), 3)
        .unwrap();

    assert_plan_contract(&plan, 3);
}

#[test]
fn unhealthy_servers_receive_nothing() {
    let mut model = equal_servers(4);
    model.create_collection("c", "app", 8, 1, 1.0).unwrap();
    for id in 0..8u32 {
        let shard = model.shard_mut(ShardId(id)).unwrap();
        shard.size = GIB;
        shard.leader = 0;
    }

    let mut healthy = all_healthy(&model);
    healthy.remove(&3);

    let optimizer = Optimizer::new(OptimizerConfig::default());
    let plan = optimizer
        .optimize(&mut model, &healthy, CandidateFlags::all(), 10)
        .unwrap();

    assert!(!plan.is_empty());
    assert!(plan.jobs.iter().all(|j| j.to != 3));
}

#[test]
fn balanced_cluster_yields_empty_plan() {
    // Perfect round-robin with equal sizes has nothing worth moving.
    let mut model = equal_servers(3);
    model.create_collection("c", "app", 6, 1, 1.0).unwrap();
    for id in 0..6u32 {
        model.shard_mut(ShardId(id)).unwrap().size = 100;
    }

    let healthy = all_healthy(&model);
    let optimizer = Optimizer::new(OptimizerConfig::default());
    let plan = optimizer
        .optimize(&mut model, &healthy, CandidateFlags::all(), 10)
        .unwrap();

    assert!(plan.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn optimize_contract_holds_for_random_clusters(
        servers in 3usize..6,
        shards in 1usize..10,
        rf in 1usize..4,
        seed in 0u64..1000,
        at_most in 1usize..8,
    ) {
        prop_assume!(rf <= servers);

        let mut model = equal_servers(servers);
        model.create_collection("c", "app", shards, rf, 1.0).unwrap();
        for id in 0..shards as u32 {
            model.shard_mut(ShardId(id)).unwrap().size = (10 + 7 * id as u64) << 20;
        }
        let probabilities: Vec<f64> = (0..servers).map(|i| (i + 1) as f64).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        model.distribute_shards_randomly(&probabilities, &mut rng).unwrap();

        let before = model.snapshot_shards();
        let healthy = all_healthy(&model);
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let plan = optimizer
            .optimize(&mut model, &healthy, CandidateFlags::all(), at_most)
            .unwrap();

        prop_assert!(shard_tables_equal(&before, &model.snapshot_shards()));
        prop_assert!(plan.len() <= at_most);
        let mut previous = f64::INFINITY;
        for job in &plan.jobs {
            prop_assert!(job.score > 0.0);
            prop_assert!(job.score <= previous);
            previous = job.score;
        }
    }
}
