//! Move simulator and applier
//!
//! `simulate` evaluates a `MoveShardJob` against the current model and
//! imbalance state without mutating anything, returning a `MoveEffect`
//! holding the post-move scores and the deltas needed to apply it.
//! `commit` applies such an effect for real. Keeping simulation pure means
//! an error path can never leave half-applied state behind.

use shardpilot_cluster::{ClusterModel, ShardId};
use thiserror::Error;

use crate::candidates::MoveShardJob;
use crate::imbalance::{pi_coefficients, pi_coefficients_with, LeaderImbalance, ShardImbalance};

/// Applier errors
///
/// None of these should appear when jobs come from the candidate
/// generator; the optimizer treats one as a modeling-consistency failure
/// and aborts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("Invalid shard id: {0:?}")]
    InvalidShard(ShardId),

    #[error("Invalid server index {server} (cluster has {servers})")]
    InvalidServer { server: usize, servers: usize },

    #[error("Source and destination are both server {0}")]
    SameServer(usize),

    #[error("Server {from} is not the leader of shard {shard} (leader is {leader})")]
    NotLeader {
        shard: ShardId,
        from: usize,
        leader: usize,
    },

    #[error("Follower set of shard {shard} is inconsistent with the job (server {server})")]
    FollowerInconsistency { shard: ShardId, server: usize },
}

pub type Result<T> = std::result::Result<T, ApplyError>;

/// Evaluated outcome of one move
///
/// Carries the post-move scalar imbalances plus everything `commit` needs
/// to apply the move incrementally.
#[derive(Debug, Clone)]
pub struct MoveEffect {
    pub shard_imbalance_after: f64,
    pub leader_imbalance_after: f64,
    kind: EffectKind,
}

#[derive(Debug, Clone)]
enum EffectKind {
    /// Leader/follower swap: `slot` is the follower slot holding `to`
    SwapLeader {
        slot: usize,
        weight: f64,
        pi_before: Vec<f64>,
        pi_after: Vec<f64>,
    },
    /// Leadership relocates to a server without a copy
    MoveLeader {
        size: f64,
        weight: f64,
        pi_before: Vec<f64>,
        pi_after: Vec<f64>,
    },
    /// One follower slot relocates
    MoveFollower { slot: usize, size: f64 },
}

/// Evaluate a move without mutating model or imbalance state
pub fn simulate(
    model: &ClusterModel,
    shard_imb: &ShardImbalance,
    leader_imb: &LeaderImbalance,
    job: &MoveShardJob,
    pi_factor: f64,
) -> Result<MoveEffect> {
    let servers = model.servers().len();
    let shard = model
        .shard(job.shard)
        .ok_or(ApplyError::InvalidShard(job.shard))?;
    for server in [job.from, job.to] {
        if server >= servers {
            return Err(ApplyError::InvalidServer { server, servers });
        }
    }
    if job.from == job.to {
        return Err(ApplyError::SameServer(job.from));
    }

    let collection = model
        .collection(shard.collection)
        .ok_or(ApplyError::InvalidShard(job.shard))?;

    if job.is_leader {
        if shard.leader != job.from {
            return Err(ApplyError::NotLeader {
                shard: shard.id,
                from: job.from,
                leader: shard.leader,
            });
        }

        let pi_before = pi_coefficients(model, collection, pi_factor);

        if let Some(slot) = shard.followers.iter().position(|f| *f == job.to) {
            // Pure swap: leadership and the vacated follower slot trade
            // places, no copy moves.
            let mut followers = shard.followers.clone();
            followers[slot] = job.from;
            let pi_after = pi_coefficients_with(
                model,
                collection,
                pi_factor,
                Some((shard.id, job.to, &followers)),
            );
            let leader_after = leader_imb.after_leader_move(
                job.from,
                job.to,
                shard.weight,
                &pi_before,
                &pi_after,
            );
            Ok(MoveEffect {
                shard_imbalance_after: shard_imb.imbalance,
                leader_imbalance_after: leader_after,
                kind: EffectKind::SwapLeader {
                    slot,
                    weight: shard.weight,
                    pi_before,
                    pi_after,
                },
            })
        } else {
            // Leadership relocates along with the data copy; the follower
            // set is untouched.
            let pi_after = pi_coefficients_with(
                model,
                collection,
                pi_factor,
                Some((shard.id, job.to, &shard.followers)),
            );
            let leader_after = leader_imb.after_leader_move(
                job.from,
                job.to,
                shard.weight,
                &pi_before,
                &pi_after,
            );
            Ok(MoveEffect {
                shard_imbalance_after: shard_imb.after_move(job.from, job.to, shard.size as f64),
                leader_imbalance_after: leader_after,
                kind: EffectKind::MoveLeader {
                    size: shard.size as f64,
                    weight: shard.weight,
                    pi_before,
                    pi_after,
                },
            })
        }
    } else {
        let slot = shard
            .followers
            .iter()
            .position(|f| *f == job.from)
            .ok_or(ApplyError::FollowerInconsistency {
                shard: shard.id,
                server: job.from,
            })?;
        if shard.holds(job.to) {
            return Err(ApplyError::FollowerInconsistency {
                shard: shard.id,
                server: job.to,
            });
        }

        // Follower relocation only shifts bytes; leadership accounting is
        // untouched.
        Ok(MoveEffect {
            shard_imbalance_after: shard_imb.after_move(job.from, job.to, shard.size as f64),
            leader_imbalance_after: leader_imb.imbalance,
            kind: EffectKind::MoveFollower {
                slot,
                size: shard.size as f64,
            },
        })
    }
}

/// Evaluate and apply a move for real
///
/// Mutates the shard table and both imbalance structs; returns the same
/// effect `simulate` would have.
pub fn commit(
    model: &mut ClusterModel,
    shard_imb: &mut ShardImbalance,
    leader_imb: &mut LeaderImbalance,
    job: &MoveShardJob,
    pi_factor: f64,
) -> Result<MoveEffect> {
    let effect = simulate(model, shard_imb, leader_imb, job, pi_factor)?;

    match &effect.kind {
        EffectKind::SwapLeader {
            slot,
            weight,
            pi_before,
            pi_after,
        } => {
            leader_imb.commit_leader_move(job.from, job.to, *weight, pi_before, pi_after);
            let shard = model.shard_mut(job.shard).unwrap();
            shard.leader = job.to;
            shard.followers[*slot] = job.from;
        }
        EffectKind::MoveLeader {
            size,
            weight,
            pi_before,
            pi_after,
        } => {
            shard_imb.commit_move(job.from, job.to, *size);
            leader_imb.commit_leader_move(job.from, job.to, *weight, pi_before, pi_after);
            model.shard_mut(job.shard).unwrap().leader = job.to;
        }
        EffectKind::MoveFollower { slot, size } => {
            shard_imb.commit_move(job.from, job.to, *size);
            model.shard_mut(job.shard).unwrap().followers[*slot] = job.to;
        }
    }

    Ok(effect)
}
