/// Declarative description of a simulated cluster hosting one collection.
///
/// Shard ids missing from `leaders` are led by `default_leader`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub collection: String,
    pub schema: IndexSchema,
    pub shard_count: u32,
    pub default_leader: String,
    #[serde(default)]
    pub leaders: HashMap<u32, String>,
    #[serde(default)]
    pub followers: HashMap<u32, Vec<String>>,
    pub nodes: Vec<String>,
    #[serde(default)]
    pub tolerant: TolerantUpdateConfig,
}

impl ClusterSpec {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| IndexError::BadRequest(format!("invalid cluster spec: {}", err)))
    }

    pub fn routing_table(&self) -> Result<ShardRoutingTable> {
        let mut table = ShardRoutingTable::new(self.shard_count, self.default_leader.clone())?;
        for (shard_id, leader) in &self.leaders {
            table.set_shard_leader(*shard_id, leader.clone(), 1)?;
        }
        for (shard_id, followers) in &self.followers {
            table.set_shard_followers(*shard_id, followers.clone())?;
        }
        table.validate()?;
        Ok(table)
    }

    /// Cluster state where every node in `nodes` is a live member.
    pub fn cluster_state(&self) -> Result<ClusterState> {
        let mut state = ClusterState::new(ClusterMembership::new(self.nodes.clone())?);
        let table = self.routing_table()?;
        for node in table.leader_nodes() {
            state.membership.require_member(&node, "Leader")?;
        }
        state.set_collection(self.collection.clone(), table)?;
        Ok(state)
    }

    /// Starts every node with a shared topology and registers it with one
    /// in-memory forwarder. Each node keeps its own handle on the forwarder.
    pub async fn build(&self) -> Result<SimulatedCluster> {
        self.schema.validate()?;
        let topology = SharedClusterState::new(self.cluster_state()?);
        let forwarder = InMemoryForwarder::new();
        let schema = Arc::new(self.schema.clone());

        let mut nodes = HashMap::new();
        for node_id in &self.nodes {
            let node = Arc::new(ClusterNode::new(
                node_id.clone(),
                self.collection.clone(),
                schema.clone(),
                topology.clone(),
                Arc::new(forwarder.clone()),
                self.tolerant.clone(),
            )?);
            forwarder.register_peer(&node).await?;
            nodes.insert(node_id.clone(), node);
        }

        info!(
            "started simulated cluster for '{}' with {} node(s) and {} shard(s)",
            self.collection,
            nodes.len(),
            self.shard_count
        );
        Ok(SimulatedCluster { topology, nodes })
    }
}

/// Running nodes built from a `ClusterSpec`.
pub struct SimulatedCluster {
    topology: SharedClusterState,
    nodes: HashMap<String, Arc<ClusterNode>>,
}

impl SimulatedCluster {
    pub fn topology(&self) -> &SharedClusterState {
        &self.topology
    }

    pub fn node(&self, node_id: &str) -> Result<Arc<ClusterNode>> {
        self.nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| IndexError::Routing(format!("Unknown node '{}'", node_id)))
    }

    /// Sorted ids of the running nodes.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids = self.nodes.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Stops a node: it stays in the topology but can no longer be reached.
    pub fn stop_node(&mut self, node_id: &str) -> bool {
        self.nodes.remove(node_id).is_some()
    }

    /// Submits a client batch to `node_id`.
    pub async fn submit(
        &self,
        node_id: &str,
        commands: Vec<UpdateCommand>,
        params: UpdateParams,
    ) -> Result<UpdateResponse> {
        let node = self.node(node_id)?;
        Ok(node.handle_update(UpdateRequest::new(commands, params)).await)
    }

    /// Ids indexed on `node_id`, sorted.
    pub async fn indexed_ids(&self, node_id: &str) -> Result<Vec<String>> {
        let node = self.node(node_id)?;
        let index = node.index();
        let ids = index.lock().await.ids();
        Ok(ids)
    }
}
