//! Candidate generation
//!
//! Enumerates every legal shard move, grouped so that all candidates
//! touching one collection land in the same group. The collection-level
//! clustering penalty couples shards of a collection, so splitting a
//! collection across groups would make their scores lie.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use shardpilot_cluster::{ClusterModel, ShardId};
use tracing::debug;

/// Which kinds of moves the generator may propose
#[derive(Debug, Clone, Copy)]
pub struct CandidateFlags {
    /// Promote an existing follower to leader (metadata-only)
    pub leader_changes: bool,
    /// Move leadership to a server without a copy (transfers data)
    pub leader_moves: bool,
    /// Relocate a follower copy to a server without one
    pub follower_moves: bool,
}

impl CandidateFlags {
    pub fn all() -> Self {
        Self {
            leader_changes: true,
            leader_moves: true,
            follower_moves: true,
        }
    }
}

/// One proposed, scored rebalancing action
///
/// `from` and `to` are server indices; invariant `from != to`. Scores and
/// post-move imbalances are filled in by the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveShardJob {
    pub shard: ShardId,
    pub from: usize,
    pub to: usize,
    /// Moves leadership rather than a follower copy
    pub is_leader: bool,
    /// Requires a data transfer (false for pure leader/follower swaps)
    pub moves_data: bool,
    pub score: f64,
    pub shard_imbalance_after: f64,
    pub leader_imbalance_after: f64,
}

impl MoveShardJob {
    fn new(shard: ShardId, from: usize, to: usize, is_leader: bool, moves_data: bool) -> Self {
        Self {
            shard,
            from,
            to,
            is_leader,
            moves_data,
            score: 0.0,
            shard_imbalance_after: 0.0,
            leader_imbalance_after: 0.0,
        }
    }
}

/// Enumerate move candidates for every eligible shard, grouped by
/// collection
///
/// Destinations are restricted to `healthy` servers. Groups flush only at
/// collection boundaries once `group_limit` is reached, so a group can
/// overshoot the limit by one collection's worth of candidates.
pub fn generate_groups(
    model: &ClusterModel,
    healthy: &HashSet<usize>,
    flags: CandidateFlags,
    group_limit: usize,
) -> Vec<Vec<MoveShardJob>> {
    let mut groups = Vec::new();
    let mut current: Vec<MoveShardJob> = Vec::new();

    for collection in model.collections() {
        if collection.blocked || collection.ignored {
            continue;
        }
        let database_skipped = model
            .database(collection.database)
            .map(|db| db.blocked || db.ignored)
            .unwrap_or(true);
        if database_skipped {
            continue;
        }

        for shard_id in &collection.shards {
            let Some(shard) = model.shard(*shard_id) else {
                continue;
            };
            if shard.blocked || shard.ignored {
                continue;
            }

            if flags.leader_changes {
                for follower in &shard.followers {
                    if healthy.contains(follower) {
                        current.push(MoveShardJob::new(
                            shard.id,
                            shard.leader,
                            *follower,
                            true,
                            false,
                        ));
                    }
                }
            }

            if flags.leader_moves {
                for server in 0..model.servers().len() {
                    if healthy.contains(&server) && !shard.holds(server) {
                        current.push(MoveShardJob::new(
                            shard.id,
                            shard.leader,
                            server,
                            true,
                            true,
                        ));
                    }
                }
            }

            if flags.follower_moves {
                for follower in &shard.followers {
                    for server in 0..model.servers().len() {
                        if healthy.contains(&server) && !shard.holds(server) {
                            current.push(MoveShardJob::new(
                                shard.id,
                                *follower,
                                server,
                                false,
                                true,
                            ));
                        }
                    }
                }
            }
        }

        // Flush only between collections, never inside one.
        if current.len() >= group_limit {
            groups.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    debug!(
        groups = groups.len(),
        candidates = groups.iter().map(Vec::len).sum::<usize>(),
        "Candidate groups generated"
    );

    groups
}
