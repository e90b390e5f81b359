//! Plan hand-off records
//!
//! The optimizer's output for the maintenance subsystem: internal jobs
//! plus a description keyed by external names (database, collection,
//! shard, server short names) instead of model indices.

use serde::{Deserialize, Serialize};
use shardpilot_cluster::ClusterModel;
use tracing::warn;

use crate::candidates::MoveShardJob;

/// Ranked, bounded sequence of shard moves
#[derive(Debug, Clone, Default)]
pub struct RebalancePlan {
    /// Non-increasing by score; every score is positive
    pub jobs: Vec<MoveShardJob>,
}

impl RebalancePlan {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Resolve jobs into externally-named action records
    ///
    /// Entries that no longer resolve against the model are skipped with a
    /// warning; that only happens if the model was rebuilt between
    /// optimizing and describing.
    pub fn describe(&self, model: &ClusterModel) -> Vec<PlanAction> {
        self.jobs
            .iter()
            .filter_map(|job| {
                let action = PlanAction::resolve(model, job);
                if action.is_none() {
                    warn!(shard = ?job.shard, "Plan entry no longer resolves, skipping");
                }
                action
            })
            .collect()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let data_moves = self.jobs.iter().filter(|j| j.moves_data).count();
        format!(
            "{} moves ({} transferring data, {} metadata-only)",
            self.jobs.len(),
            data_moves,
            self.jobs.len() - data_moves
        )
    }
}

/// One move, keyed by external names for the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAction {
    pub database: String,
    pub collection: String,
    pub shard: String,
    pub from_server: String,
    pub to_server: String,
    pub is_leader: bool,
    pub moves_data: bool,
    pub score: f64,
}

impl PlanAction {
    fn resolve(model: &ClusterModel, job: &MoveShardJob) -> Option<Self> {
        let shard = model.shard(job.shard)?;
        let collection = model.collection(shard.collection)?;
        let database = model.database(collection.database)?;
        Some(Self {
            database: database.name.clone(),
            collection: collection.name.clone(),
            shard: shard.name.clone(),
            from_server: model.server(job.from)?.short_name.clone(),
            to_server: model.server(job.to)?.short_name.clone(),
            is_leader: job.is_leader,
            moves_data: job.moves_data,
            score: job.score,
        })
    }
}
