//! Cluster topology model for shardpilot
//!
//! Holds the snapshot of cluster state the rebalancer optimizes over:
//! - Storage servers with capacity and zone placement
//! - Databases, collections, and their shards
//! - Leader/follower replica assignments per shard
//!
//! The model is plain in-memory data. Topology discovery, health checks,
//! and move execution live outside this crate; the model only has to be
//! consistent for the duration of one optimization pass.

pub mod cluster;
pub mod distribute;
pub mod error;
pub mod models;

// Re-export main types
pub use cluster::ClusterModel;
pub use error::{ModelError, Result};
pub use models::{
    Collection, CollectionId, Database, DatabaseId, DbServer, Shard, ShardId, Zone,
};
