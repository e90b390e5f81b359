//! Shardpilot rebalancer library
//!
//! Computes a bounded, ranked sequence of shard moves that reduces storage
//! and leadership imbalance across a cluster snapshot:
//! - Imbalance metrics (capacity-proportional storage and leadership
//!   fairness scores)
//! - Candidate generation (leader changes, leader moves, follower moves)
//! - A pure move simulator plus a committing applier
//! - A greedy per-collection-group optimizer merged into one global plan
//!
//! Physical execution of the resulting `MoveShardJob`s is the maintenance
//! subsystem's business; this crate never performs I/O.

pub mod applier;
pub mod candidates;
pub mod config;
pub mod imbalance;
pub mod optimizer;
pub mod plan;

// Re-export main types
pub use applier::{ApplyError, MoveEffect};
pub use candidates::{CandidateFlags, MoveShardJob};
pub use config::OptimizerConfig;
pub use imbalance::{LeaderImbalance, ShardImbalance};
pub use optimizer::{OptimizeError, Optimizer};
pub use plan::{PlanAction, RebalancePlan};
