//! Imbalance metrics
//!
//! Two scalar fairness scores over one cluster snapshot:
//! - `ShardImbalance`: byte distribution vs. capacity-proportional targets
//! - `LeaderImbalance`: leadership weight vs. CPU-proportional targets,
//!   plus a per-collection leadership-clustering penalty
//!
//! Both use sum-of-squared deviations so a single move only touches the
//! two affected servers' terms, keeping rescoring O(1) per server instead
//! of a full recompute.

use shardpilot_cluster::{ClusterModel, Collection, ShardId};

/// Byte-distribution imbalance, one value per server plus the scalar score
#[derive(Debug, Clone, PartialEq)]
pub struct ShardImbalance {
    /// Bytes held per server (leader and follower copies)
    pub size_used: Vec<f64>,
    /// Capacity-proportional fair share per server
    pub target_size: Vec<f64>,
    /// Shard copies held per server
    pub number_shards: Vec<u64>,
    pub total_used: f64,
    pub total_shards: u64,
    /// Sum of squared deviations from target
    pub imbalance: f64,
}

impl ShardImbalance {
    /// Compute from scratch over every shard's leader and followers
    pub fn compute(model: &ClusterModel) -> Self {
        let n = model.servers().len();
        let mut size_used = vec![0.0; n];
        let mut number_shards = vec![0u64; n];
        let mut total_used = 0.0;
        let mut total_shards = 0u64;

        for shard in model.shards() {
            for server in shard.servers() {
                size_used[server] += shard.size as f64;
                number_shards[server] += 1;
                total_used += shard.size as f64;
                total_shards += 1;
            }
        }

        let total_volume: f64 = model.servers().iter().map(|s| s.volume_size as f64).sum();
        let target_size: Vec<f64> = if total_volume > 0.0 {
            model
                .servers()
                .iter()
                .map(|s| total_used * s.volume_size as f64 / total_volume)
                .collect()
        } else {
            vec![0.0; n]
        };

        let imbalance = size_used
            .iter()
            .zip(&target_size)
            .map(|(used, target)| (used - target) * (used - target))
            .sum();

        Self {
            size_used,
            target_size,
            number_shards,
            total_used,
            total_shards,
            imbalance,
        }
    }

    fn term(&self, server: usize) -> f64 {
        let d = self.size_used[server] - self.target_size[server];
        d * d
    }

    /// Scalar imbalance after moving `size` bytes from one server to
    /// another, without mutating anything
    ///
    /// Totals are unchanged by a move, so the targets stay valid.
    pub fn after_move(&self, from: usize, to: usize, size: f64) -> f64 {
        let from_new = self.size_used[from] - size - self.target_size[from];
        let to_new = self.size_used[to] + size - self.target_size[to];
        self.imbalance - self.term(from) - self.term(to)
            + from_new * from_new
            + to_new * to_new
    }

    /// Apply a byte move for real
    pub fn commit_move(&mut self, from: usize, to: usize, size: f64) {
        self.imbalance = self.after_move(from, to, size);
        self.size_used[from] -= size;
        self.size_used[to] += size;
        self.number_shards[from] -= 1;
        self.number_shards[to] += 1;
    }
}

/// Leadership-distribution imbalance
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderImbalance {
    /// Leadership weight per server
    pub weight_used: Vec<f64>,
    /// CPU-proportional fair share per server
    pub target_weight: Vec<f64>,
    /// Shards led per server
    pub number_shards: Vec<u64>,
    /// Per-collection clustering penalty, summed per server
    pub leader_dupl: Vec<f64>,
    pub total_weight: f64,
    pub total_shards: u64,
    /// Squared weight deviations plus the clustering penalty
    pub imbalance: f64,
}

impl LeaderImbalance {
    /// Compute from scratch over every shard's leader
    pub fn compute(model: &ClusterModel, pi_factor: f64) -> Self {
        let n = model.servers().len();
        let mut weight_used = vec![0.0; n];
        let mut number_shards = vec![0u64; n];
        let mut total_weight = 0.0;
        let mut total_shards = 0u64;

        for shard in model.shards() {
            weight_used[shard.leader] += shard.weight;
            number_shards[shard.leader] += 1;
            total_weight += shard.weight;
            total_shards += 1;
        }

        let mut leader_dupl = vec![0.0; n];
        for collection in model.collections() {
            let pi = pi_coefficients(model, collection, pi_factor);
            for (dupl, p) in leader_dupl.iter_mut().zip(&pi) {
                *dupl += p;
            }
        }

        let total_cpu: f64 = model.servers().iter().map(|s| s.cpu_capacity).sum();
        let target_weight: Vec<f64> = if total_cpu > 0.0 {
            model
                .servers()
                .iter()
                .map(|s| total_weight * s.cpu_capacity / total_cpu)
                .collect()
        } else {
            vec![0.0; n]
        };

        let imbalance = weight_used
            .iter()
            .zip(&target_weight)
            .map(|(used, target)| (used - target) * (used - target))
            .sum::<f64>()
            + leader_dupl.iter().sum::<f64>();

        Self {
            weight_used,
            target_weight,
            number_shards,
            leader_dupl,
            total_weight,
            total_shards,
            imbalance,
        }
    }

    fn term(&self, server: usize) -> f64 {
        let d = self.weight_used[server] - self.target_weight[server];
        d * d
    }

    /// Scalar imbalance after relocating leadership weight from one server
    /// to another and swapping one collection's penalty vector, without
    /// mutating anything
    pub fn after_leader_move(
        &self,
        from: usize,
        to: usize,
        weight: f64,
        pi_before: &[f64],
        pi_after: &[f64],
    ) -> f64 {
        let from_new = self.weight_used[from] - weight - self.target_weight[from];
        let to_new = self.weight_used[to] + weight - self.target_weight[to];
        let pi_delta: f64 = pi_after.iter().sum::<f64>() - pi_before.iter().sum::<f64>();
        self.imbalance - self.term(from) - self.term(to)
            + from_new * from_new
            + to_new * to_new
            + pi_delta
    }

    /// Apply a leadership move for real
    pub fn commit_leader_move(
        &mut self,
        from: usize,
        to: usize,
        weight: f64,
        pi_before: &[f64],
        pi_after: &[f64],
    ) {
        self.imbalance = self.after_leader_move(from, to, weight, pi_before, pi_after);
        self.weight_used[from] -= weight;
        self.weight_used[to] += weight;
        self.number_shards[from] -= 1;
        self.number_shards[to] += 1;
        for ((dupl, before), after) in self.leader_dupl.iter_mut().zip(pi_before).zip(pi_after) {
            *dupl += after - before;
        }
    }
}

/// Per-server leadership-clustering penalty for one collection
///
/// Servers holding at least one copy (leader or follower) of any shard of
/// the collection are compared against the average leader count over those
/// holders; each holder contributes `(leaders − average)² × pi_factor`.
/// Single-shard collections contribute nothing, there is no clustering to
/// penalize.
pub fn pi_coefficients(model: &ClusterModel, collection: &Collection, pi_factor: f64) -> Vec<f64> {
    pi_coefficients_with(model, collection, pi_factor, None)
}

/// `pi_coefficients` with one shard's placement hypothetically replaced
///
/// Lets the move simulator evaluate a collection's penalty after a move
/// without touching the model.
pub fn pi_coefficients_with(
    model: &ClusterModel,
    collection: &Collection,
    pi_factor: f64,
    replace: Option<(ShardId, usize, &[usize])>,
) -> Vec<f64> {
    let n = model.servers().len();
    let mut pi = vec![0.0; n];
    if collection.shards.len() <= 1 {
        return pi;
    }

    let mut leaders = vec![0u64; n];
    let mut copies = vec![0u64; n];
    for shard_id in &collection.shards {
        let Some(shard) = model.shard(*shard_id) else {
            continue;
        };
        match replace {
            Some((replaced, leader, followers)) if replaced == *shard_id => {
                leaders[leader] += 1;
                copies[leader] += 1;
                for f in followers {
                    copies[*f] += 1;
                }
            }
            _ => {
                leaders[shard.leader] += 1;
                for server in shard.servers() {
                    copies[server] += 1;
                }
            }
        }
    }

    let holders = copies.iter().filter(|c| **c > 0).count();
    if holders == 0 {
        return pi;
    }
    let average = collection.shards.len() as f64 / holders as f64;

    for server in 0..n {
        if copies[server] > 0 {
            let d = leaders[server] as f64 - average;
            pi[server] = d * d * pi_factor;
        }
    }
    pi
}
