//! Greedy rebalancing optimizer
//!
//! Scores every candidate against the live imbalance state, commits the
//! best one, rescores the rest (earlier moves change later moves' value),
//! and repeats per group; group outputs are then k-way merged into one
//! bounded global plan. The shard table is restored before returning, so
//! `optimize` is observably pure.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use shardpilot_cluster::ClusterModel;
use thiserror::Error;
use tracing::{debug, info};

use crate::applier::{self, ApplyError};
use crate::candidates::{generate_groups, CandidateFlags, MoveShardJob};
use crate::config::OptimizerConfig;
use crate::imbalance::{LeaderImbalance, ShardImbalance};
use crate::plan::RebalancePlan;

/// Optimizer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// A generated candidate failed evaluation; the model and the
    /// generator disagree about cluster state
    #[error("Move evaluation failed: {0}")]
    Apply(#[from] ApplyError),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Shard-rebalancing optimizer
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Compute a ranked plan of at most `at_most` moves
    ///
    /// `healthy` is the set of servers allowed as destinations. The model
    /// is mutated during scoring but its shard table is restored before
    /// returning, error or not.
    pub fn optimize(
        &self,
        model: &mut ClusterModel,
        healthy: &HashSet<usize>,
        flags: CandidateFlags,
        at_most: usize,
    ) -> Result<RebalancePlan> {
        let snapshot = model.snapshot_shards();
        let result = self.optimize_inner(model, healthy, flags, at_most);
        model.restore_shards(snapshot);
        result
    }

    fn optimize_inner(
        &self,
        model: &mut ClusterModel,
        healthy: &HashSet<usize>,
        flags: CandidateFlags,
        at_most: usize,
    ) -> Result<RebalancePlan> {
        let pi = self.config.pi_factor;
        let groups = generate_groups(model, healthy, flags, self.config.group_limit);

        let mut shard_imb = ShardImbalance::compute(model);
        let mut leader_imb = LeaderImbalance::compute(model, pi);
        info!(
            groups = groups.len(),
            shard_imbalance = shard_imb.imbalance,
            leader_imbalance = leader_imb.imbalance,
            "Optimization started"
        );

        let mut ranked: Vec<Vec<MoveShardJob>> = Vec::with_capacity(groups.len());
        for mut group in groups {
            score_all(model, &shard_imb, &leader_imb, &mut group, pi)?;
            group.sort_by(|a, b| b.score.total_cmp(&a.score));
            group.retain(|j| j.score > 0.0);
            group.truncate(at_most);

            let mut committed: Vec<MoveShardJob> = Vec::new();
            let mut previous_score = f64::INFINITY;

            while !group.is_empty() && committed.len() < at_most {
                let mut top = group.remove(0);
                applier::commit(model, &mut shard_imb, &mut leader_imb, &top, pi)?;

                // Rescoring can raise a later candidate above an earlier
                // commit; clamp so the group stays non-increasing for the
                // merge. Intentional approximation, not a defect.
                if top.score > previous_score {
                    top.score = previous_score;
                }
                debug_assert!(top.score <= previous_score);
                previous_score = top.score;

                // Remaining candidates for the committed shard are stale
                // (their from/to no longer match its placement) or
                // redundant; drop them before rescoring.
                group.retain(|j| j.shard != top.shard);
                committed.push(top);

                score_all(model, &shard_imb, &leader_imb, &mut group, pi)?;
                group.retain(|j| j.score > 0.0);
                group.sort_by(|a, b| b.score.total_cmp(&a.score));
            }

            if !committed.is_empty() {
                debug!(
                    moves = committed.len(),
                    best = committed[0].score,
                    "Group optimized"
                );
                ranked.push(committed);
            }
        }

        let plan = merge_ranked(ranked, at_most);
        info!(
            moves = plan.jobs.len(),
            shard_imbalance = shard_imb.imbalance,
            leader_imbalance = leader_imb.imbalance,
            "Optimization finished"
        );
        Ok(plan)
    }
}

/// Score (or rescore) every job against the current state
fn score_all(
    model: &ClusterModel,
    shard_imb: &ShardImbalance,
    leader_imb: &LeaderImbalance,
    jobs: &mut [MoveShardJob],
    pi_factor: f64,
) -> Result<()> {
    for job in jobs {
        let effect = applier::simulate(model, shard_imb, leader_imb, job, pi_factor)?;
        job.score = (shard_imb.imbalance - effect.shard_imbalance_after)
            + (leader_imb.imbalance - effect.leader_imbalance_after);
        job.shard_imbalance_after = effect.shard_imbalance_after;
        job.leader_imbalance_after = effect.leader_imbalance_after;
    }
    Ok(())
}

struct MergeHead {
    score: f64,
    group: usize,
    pos: usize,
}

impl PartialEq for MergeHead {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score) == Ordering::Equal
    }
}

impl Eq for MergeHead {}

impl PartialOrd for MergeHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeHead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

/// K-way merge of per-group ranked lists into one bounded plan
///
/// Each group list is non-increasing by score, so a max-heap over the
/// group heads yields a globally non-increasing plan.
fn merge_ranked(groups: Vec<Vec<MoveShardJob>>, at_most: usize) -> RebalancePlan {
    let mut heap: BinaryHeap<MergeHead> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| !g.is_empty())
        .map(|(group, g)| MergeHead {
            score: g[0].score,
            group,
            pos: 0,
        })
        .collect();

    let mut jobs = Vec::new();
    while let Some(head) = heap.pop() {
        if jobs.len() >= at_most {
            break;
        }
        jobs.push(groups[head.group][head.pos].clone());
        let next = head.pos + 1;
        if next < groups[head.group].len() {
            heap.push(MergeHead {
                score: groups[head.group][next].score,
                group: head.group,
                pos: next,
            });
        }
    }

    RebalancePlan { jobs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardpilot_cluster::ShardId;

    fn job_with_score(shard: u32, score: f64) -> MoveShardJob {
        MoveShardJob {
            shard: ShardId(shard),
            from: 0,
            to: 1,
            is_leader: true,
            moves_data: true,
            score,
            shard_imbalance_after: 0.0,
            leader_imbalance_after: 0.0,
        }
    }

    #[test]
    fn test_merge_interleaves_by_score() {
        let groups = vec![
            vec![job_with_score(0, 9.0), job_with_score(1, 3.0)],
            vec![job_with_score(2, 7.0), job_with_score(3, 5.0)],
        ];

        let plan = merge_ranked(groups, 10);
        let scores: Vec<f64> = plan.jobs.iter().map(|j| j.score).collect();
        assert_eq!(scores, vec![9.0, 7.0, 5.0, 3.0]);
    }

    #[test]
    fn test_merge_respects_bound() {
        let groups = vec![
            vec![job_with_score(0, 9.0), job_with_score(1, 3.0)],
            vec![job_with_score(2, 7.0)],
        ];

        let plan = merge_ranked(groups, 2);
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[0].score, 9.0);
        assert_eq!(plan.jobs[1].score, 7.0);
    }

    #[test]
    fn test_merge_empty_groups() {
        let plan = merge_ranked(vec![vec![], vec![]], 5);
        assert!(plan.jobs.is_empty());
    }
}
