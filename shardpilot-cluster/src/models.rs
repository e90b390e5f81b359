//! Cluster model entities
//!
//! Servers are referenced by their index in the model's server table;
//! databases, collections, and shards carry small integer ids. All entity
//! state except shard replica assignments is read-only during optimization.

use serde::{Deserialize, Serialize};

/// Database id, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseId(pub u32);

/// Collection id, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub u32);

/// Shard id, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub u32);

impl std::fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.0)
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Failure-domain label; immutable after setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
}

/// A storage node
///
/// Read-only during optimization; capacity fields drive the
/// capacity-proportional imbalance targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbServer {
    pub id: String,
    pub short_name: String,
    /// Total volume size in bytes
    pub volume_size: u64,
    /// Currently free disk space in bytes
    pub free_disk_size: u64,
    /// Relative CPU capacity, 1.0 = baseline
    pub cpu_capacity: f64,
    /// Zone the server lives in
    pub zone: String,
}

/// One partition of a collection, replicated across servers
///
/// `leader` and `followers` are server indices. Invariant: the leader is
/// never in the follower list, and the follower count stays constant across
/// committed moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    pub name: String,
    pub leader: usize,
    pub followers: Vec<usize>,
    pub replication_factor: usize,
    /// Payload size in bytes
    pub size: u64,
    pub collection: CollectionId,
    pub weight: f64,
    pub blocked: bool,
    pub ignored: bool,
    pub is_system: bool,
}

impl Shard {
    /// Iterate all servers holding a copy, leader first
    pub fn servers(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.leader).chain(self.followers.iter().copied())
    }

    /// Does this server hold a copy (leader or follower)?
    pub fn holds(&self, server: usize) -> bool {
        self.leader == server || self.followers.contains(&server)
    }
}

/// A named group of shards inside one database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub database: DatabaseId,
    /// Never empty
    pub shards: Vec<ShardId>,
    pub weight: f64,
    pub blocked: bool,
    pub ignored: bool,
}

/// A named group of collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub id: DatabaseId,
    pub name: String,
    pub collections: Vec<CollectionId>,
    pub weight: f64,
    pub blocked: bool,
    pub ignored: bool,
}
