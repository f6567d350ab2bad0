/// Read side of the topology service consulted by update routing.
pub trait TopologyProvider: Send + Sync {
    /// Snapshot of a collection's shard layout.
    fn routing_table(&self, collection: &str) -> Result<ShardRoutingTable>;

    /// Route of `routing_key` in the current layout of `collection`.
    fn route_for(&self, collection: &str, routing_key: &str, local_node_id: &str) -> Result<ShardRoute> {
        Ok(self
            .routing_table(collection)?
            .route_for(collection, routing_key, local_node_id))
    }

    /// Shards of `collection` currently led by `node_id`.
    fn shards_led_by(&self, collection: &str, node_id: &str) -> Result<Vec<u32>> {
        Ok(self.routing_table(collection)?.shards_led_by(node_id))
    }
}

/// Cluster-wide view: live nodes plus the routing table of every collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterState {
    #[serde(default)]
    pub membership: ClusterMembership,
    #[serde(default)]
    pub collections: HashMap<String, ShardRoutingTable>,
}

impl ClusterState {
    pub fn new(membership: ClusterMembership) -> Self {
        Self {
            membership,
            collections: HashMap::new(),
        }
    }

    /// Registers or replaces a collection's layout after validating it.
    pub fn set_collection(&mut self, name: impl Into<String>, table: ShardRoutingTable) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndexError::Routing(
                "collection name must not be empty".to_string(),
            ));
        }
        table.validate()?;
        self.collections.insert(name, table);
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Result<&ShardRoutingTable> {
        self.collections
            .get(name)
            .ok_or_else(|| IndexError::Routing(format!("Unknown collection '{}'", name)))
    }

    pub fn collection_mut(&mut self, name: &str) -> Result<&mut ShardRoutingTable> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| IndexError::Routing(format!("Unknown collection '{}'", name)))
    }
}

/// A cluster view shared by the components of one node.
///
/// Clones observe the same state; separate instances model nodes whose
/// views have diverged.
#[derive(Debug, Clone, Default)]
pub struct SharedClusterState {
    inner: Arc<RwLock<ClusterState>>,
}

impl SharedClusterState {
    pub fn new(state: ClusterState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Applies a mutation atomically; the state is left untouched when it fails.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut ClusterState) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write()?;
        let mut next = guard.clone();
        let out = mutate(&mut next)?;
        *guard = next;
        Ok(out)
    }

    /// Moves a shard's leadership to a member node, bumping the epoch.
    pub fn move_shard_leader(
        &self,
        collection: &str,
        shard_id: u32,
        new_leader: &str,
    ) -> Result<ShardMovement> {
        self.update(|state| {
            let membership = state.membership.clone();
            state
                .collection_mut(collection)?
                .move_shard_leader(shard_id, new_leader, Some(&membership))
        })
    }
}

impl TopologyProvider for SharedClusterState {
    fn routing_table(&self, collection: &str) -> Result<ShardRoutingTable> {
        Ok(self.inner.read()?.collection(collection)?.clone())
    }
}
