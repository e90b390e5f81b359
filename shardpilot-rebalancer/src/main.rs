//! Shardpilot rebalancer CLI
//!
//! Demonstration glue around the optimizer: synthesizes a cluster with a
//! seeded random shard distribution, runs one optimization pass, and
//! prints the resulting plan as JSON. Real deployments feed the optimizer
//! from topology discovery instead.

use std::collections::HashSet;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, Level};

use shardpilot_cluster::ClusterModel;
use shardpilot_rebalancer::{CandidateFlags, Optimizer, OptimizerConfig};

#[derive(Parser)]
#[command(name = "shardpilot-rebalancer")]
#[command(about = "Shard-rebalancing plan generator")]
struct Cli {
    /// Number of storage servers
    #[arg(long, default_value = "5")]
    servers: usize,

    /// Number of collections
    #[arg(long, default_value = "4")]
    collections: usize,

    /// Shards per collection
    #[arg(long, default_value = "16")]
    shards: usize,

    /// Replication factor
    #[arg(long, default_value = "3")]
    replication_factor: usize,

    /// Maximum moves in the plan
    #[arg(long, default_value = "50")]
    at_most: usize,

    /// RNG seed for the synthetic distribution
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Skip follower relocations
    #[arg(long, default_value = "false")]
    no_follower_moves: bool,
}

fn build_cluster(cli: &Cli, rng: &mut StdRng) -> anyhow::Result<ClusterModel> {
    let mut model = ClusterModel::new();
    model.add_zone("z1");
    for i in 0..cli.servers {
        model.add_server(format!("node{i:02}"), 512 * 1024 * 1024 * 1024, 0, 1.0, "z1");
    }
    model.create_database("demo", 1.0);
    for c in 0..cli.collections {
        let id = model.create_collection(
            format!("c{c:03}"),
            "demo",
            cli.shards,
            cli.replication_factor,
            1.0,
        )?;
        for shard_id in model.collection(id).unwrap().shards.clone() {
            model.shard_mut(shard_id).unwrap().size =
                rng.gen_range(64 * 1024 * 1024..4 * 1024 * 1024 * 1024);
        }
    }

    // Deliberately skewed placement so there is something to fix.
    let probabilities: Vec<f64> = (0..cli.servers).map(|i| (i + 1) as f64).collect();
    model.distribute_shards_randomly(&probabilities, rng)?;
    Ok(model)
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(
        servers = cli.servers,
        collections = cli.collections,
        shards = cli.shards,
        replication_factor = cli.replication_factor,
        at_most = cli.at_most,
        seed = cli.seed,
        "Building synthetic cluster"
    );

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut model = build_cluster(&cli, &mut rng)?;

    let healthy: HashSet<usize> = (0..cli.servers).collect();
    let flags = CandidateFlags {
        leader_changes: true,
        leader_moves: true,
        follower_moves: !cli.no_follower_moves,
    };

    let optimizer = Optimizer::new(OptimizerConfig::from_env());
    let plan = optimizer.optimize(&mut model, &healthy, flags, cli.at_most)?;

    info!(summary = %plan.summary(), "Plan computed");

    let actions = plan.describe(&model);
    println!("{}", serde_json::to_string_pretty(&actions)?);
    Ok(())
}
