//! In-memory cluster model
//!
//! One `ClusterModel` is the unit of optimization: setup code builds it,
//! the rebalancer mutates shard placements through it (and restores them
//! afterwards), and everything else reads it.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::models::{
    Collection, CollectionId, Database, DatabaseId, DbServer, Shard, ShardId, Zone,
};

/// Snapshot of cluster topology under optimization
#[derive(Debug, Clone, Default)]
pub struct ClusterModel {
    zones: Vec<Zone>,
    servers: Vec<DbServer>,
    databases: Vec<Database>,
    collections: Vec<Collection>,
    shards: Vec<Shard>,
    database_names: HashMap<String, DatabaseId>,
    collection_names: HashMap<String, CollectionId>,
}

impl ClusterModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Setup =====

    /// Register a failure-domain zone
    pub fn add_zone(&mut self, id: impl Into<String>) {
        self.zones.push(Zone { id: id.into() });
    }

    /// Register a storage server, returning its index
    pub fn add_server(
        &mut self,
        short_name: impl Into<String>,
        volume_size: u64,
        free_disk_size: u64,
        cpu_capacity: f64,
        zone: impl Into<String>,
    ) -> usize {
        let index = self.servers.len();
        let short_name = short_name.into();
        self.servers.push(DbServer {
            id: format!("PRMR-{index:04}"),
            short_name,
            volume_size,
            free_disk_size,
            cpu_capacity,
            zone: zone.into(),
        });
        index
    }

    /// Create a database and register its name
    ///
    /// Re-registering a name points the lookup at the new database.
    pub fn create_database(&mut self, name: impl Into<String>, weight: f64) -> DatabaseId {
        let name = name.into();
        let id = DatabaseId(self.databases.len() as u32);
        self.databases.push(Database {
            id,
            name: name.clone(),
            collections: Vec::new(),
            weight,
            blocked: false,
            ignored: false,
        });
        self.database_names.insert(name, id);
        id
    }

    /// Create a collection with `number_of_shards` shards in the named
    /// database
    ///
    /// Shards get a round-robin placeholder placement and inherit the
    /// collection weight; callers adjust sizes and placements afterwards
    /// (see `distribute_shards_randomly`).
    pub fn create_collection(
        &mut self,
        name: impl Into<String>,
        db_name: &str,
        number_of_shards: usize,
        replication_factor: usize,
        weight: f64,
    ) -> Result<CollectionId> {
        let db_id = self
            .database_id(db_name)
            .ok_or_else(|| ModelError::UnknownDatabase(db_name.to_string()))?;
        if number_of_shards == 0 {
            return Err(ModelError::EmptyCollection);
        }
        if replication_factor == 0 || replication_factor > self.servers.len() {
            return Err(ModelError::ReplicationOutOfRange {
                replication_factor,
                servers: self.servers.len(),
            });
        }

        let name = name.into();
        let id = CollectionId(self.collections.len() as u32);
        let n = self.servers.len();
        let mut shard_ids = Vec::with_capacity(number_of_shards);

        for i in 0..number_of_shards {
            let shard_id = ShardId(self.shards.len() as u32);
            let leader = i % n;
            let followers = (1..replication_factor).map(|k| (i + k) % n).collect();
            self.shards.push(Shard {
                id: shard_id,
                name: format!("{name}-s{i}"),
                leader,
                followers,
                replication_factor,
                size: 0,
                collection: id,
                weight,
                blocked: false,
                ignored: false,
                is_system: false,
            });
            shard_ids.push(shard_id);
        }

        self.collections.push(Collection {
            id,
            name: name.clone(),
            database: db_id,
            shards: shard_ids,
            weight,
            blocked: false,
            ignored: false,
        });
        self.databases[db_id.0 as usize].collections.push(id);
        self.collection_names.insert(name.clone(), id);

        debug!(
            collection = %name,
            database = db_name,
            shards = number_of_shards,
            replication_factor,
            "Collection created"
        );

        Ok(id)
    }

    // ===== Lookups =====

    pub fn database_id(&self, name: &str) -> Option<DatabaseId> {
        self.database_names.get(name).copied()
    }

    pub fn collection_id(&self, name: &str) -> Option<CollectionId> {
        self.collection_names.get(name).copied()
    }

    // ===== Accessors =====

    pub fn servers(&self) -> &[DbServer] {
        &self.servers
    }

    pub fn server(&self, index: usize) -> Option<&DbServer> {
        self.servers.get(index)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn databases(&self) -> &[Database] {
        &self.databases
    }

    pub fn database(&self, id: DatabaseId) -> Option<&Database> {
        self.databases.get(id.0 as usize)
    }

    /// Mutable access, for setup code toggling blocked/ignored flags
    pub fn database_mut(&mut self, id: DatabaseId) -> Option<&mut Database> {
        self.databases.get_mut(id.0 as usize)
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection(&self, id: CollectionId) -> Option<&Collection> {
        self.collections.get(id.0 as usize)
    }

    /// Mutable access, for setup code toggling blocked/ignored flags
    pub fn collection_mut(&mut self, id: CollectionId) -> Option<&mut Collection> {
        self.collections.get_mut(id.0 as usize)
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn shard(&self, id: ShardId) -> Option<&Shard> {
        self.shards.get(id.0 as usize)
    }

    /// Mutable access to one shard's placement
    ///
    /// Only the rebalancer's move applier (and test/setup code) should
    /// reach for this.
    pub fn shard_mut(&mut self, id: ShardId) -> Option<&mut Shard> {
        self.shards.get_mut(id.0 as usize)
    }

    // ===== Snapshot / restore =====

    /// Snapshot the full shard table
    pub fn snapshot_shards(&self) -> Vec<Shard> {
        self.shards.clone()
    }

    /// Restore a previously taken shard-table snapshot
    pub fn restore_shards(&mut self, snapshot: Vec<Shard>) {
        self.shards = snapshot;
    }
}
