//! Randomized shard distribution
//!
//! What-if/setup utility: reassigns every shard's leader and followers by
//! weighted sampling without replacement. Never used by the optimizer
//! itself; the RNG is injected so tests and the demo bin stay
//! reproducible.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

use crate::cluster::ClusterModel;
use crate::error::{ModelError, Result};

impl ClusterModel {
    /// Reassign every shard's replicas via weighted sampling
    ///
    /// `probabilities[s]` is the relative chance of server `s` receiving a
    /// copy; one entry per server is required. Sampling is without
    /// replacement per shard (collisions are resampled), the first draw
    /// becomes the leader.
    pub fn distribute_shards_randomly<R: Rng>(
        &mut self,
        probabilities: &[f64],
        rng: &mut R,
    ) -> Result<()> {
        let n = self.servers().len();
        if probabilities.len() != n {
            return Err(ModelError::ProbabilityCount {
                expected: n,
                actual: probabilities.len(),
            });
        }

        let dist = WeightedIndex::new(probabilities)
            .map_err(|_| ModelError::DegenerateProbabilities)?;
        let positive = probabilities.iter().filter(|p| **p > 0.0).count();

        let shard_ids: Vec<_> = self.shards().iter().map(|s| s.id).collect();
        for id in shard_ids {
            let Some(replication_factor) = self.shard(id).map(|s| s.replication_factor) else {
                continue;
            };
            if replication_factor == 0 || replication_factor > n {
                return Err(ModelError::ReplicationOutOfRange {
                    replication_factor,
                    servers: n,
                });
            }
            // Sampling without replacement cannot terminate otherwise.
            if replication_factor > positive {
                return Err(ModelError::DegenerateProbabilities);
            }

            let mut picked: Vec<usize> = Vec::with_capacity(replication_factor);
            while picked.len() < replication_factor {
                let candidate = dist.sample(rng);
                if !picked.contains(&candidate) {
                    picked.push(candidate);
                }
            }

            let shard = self.shard_mut(id).unwrap();
            shard.leader = picked[0];
            shard.followers = picked[1..].to_vec();
        }

        debug!(shards = self.shards().len(), "Shards redistributed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model_with_shards(servers: usize, shards: usize, rf: usize) -> ClusterModel {
        let mut model = ClusterModel::new();
        model.add_zone("z1");
        for i in 0..servers {
            model.add_server(format!("node{i}"), 1_000_000, 1_000_000, 1.0, "z1");
        }
        model.create_database("app", 1.0);
        model.create_collection("c", "app", shards, rf, 1.0).unwrap();
        model
    }

    #[test]
    fn test_probability_count_mismatch() {
        let mut model = model_with_shards(3, 4, 1);
        let mut rng = StdRng::seed_from_u64(7);
        let err = model
            .distribute_shards_randomly(&[0.5, 0.5], &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::ProbabilityCount {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_replicas_stay_distinct() {
        let mut model = model_with_shards(4, 16, 3);
        let mut rng = StdRng::seed_from_u64(42);
        model
            .distribute_shards_randomly(&[1.0, 2.0, 3.0, 4.0], &mut rng)
            .unwrap();

        for shard in model.shards() {
            assert_eq!(shard.followers.len(), 2);
            assert!(!shard.followers.contains(&shard.leader));
            assert_ne!(shard.followers[0], shard.followers[1]);
        }
    }

    #[test]
    fn test_zero_weight_server_never_picked() {
        let mut model = model_with_shards(3, 32, 2);
        let mut rng = StdRng::seed_from_u64(1);
        model
            .distribute_shards_randomly(&[1.0, 1.0, 0.0], &mut rng)
            .unwrap();

        for shard in model.shards() {
            assert!(!shard.holds(2));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn replica_invariants_hold_for_any_seed(seed in any::<u64>(), rf in 1usize..4) {
            let mut model = model_with_shards(4, 8, rf);
            let mut rng = StdRng::seed_from_u64(seed);
            model
                .distribute_shards_randomly(&[1.0, 2.0, 3.0, 4.0], &mut rng)
                .unwrap();

            for shard in model.shards() {
                prop_assert_eq!(shard.followers.len(), rf - 1);
                prop_assert!(!shard.followers.contains(&shard.leader));
            }
        }
    }

    #[test]
    fn test_deterministic_with_same_seed() {
        let mut a = model_with_shards(4, 8, 2);
        let mut b = model_with_shards(4, 8, 2);
        let probs = [1.0, 1.0, 1.0, 1.0];

        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        a.distribute_shards_randomly(&probs, &mut rng_a).unwrap();
        b.distribute_shards_randomly(&probs, &mut rng_b).unwrap();

        for (sa, sb) in a.shards().iter().zip(b.shards()) {
            assert_eq!(sa.leader, sb.leader);
            assert_eq!(sa.followers, sb.followers);
        }
    }
}
