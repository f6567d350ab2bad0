/// One simulated node of the cluster hosting a replica of a single collection.
///
/// Each incoming batch gets a fresh chain: the tolerant session (when the
/// request asks for it) in front of a `DistributedUpdateProcessor`.
pub struct ClusterNode {
    node_id: String,
    collection: String,
    schema: Arc<IndexSchema>,
    index: Arc<Mutex<LocalIndex>>,
    topology: SharedClusterState,
    forwarder: Arc<dyn UpdateForwarder>,
    config: TolerantUpdateConfig,
}

impl ClusterNode {
    pub fn new(
        node_id: impl Into<String>,
        collection: impl Into<String>,
        schema: Arc<IndexSchema>,
        topology: SharedClusterState,
        forwarder: Arc<dyn UpdateForwarder>,
        config: TolerantUpdateConfig,
    ) -> Result<Self> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(IndexError::Routing("node_id must not be empty".to_string()));
        }
        let collection = collection.into();
        topology.routing_table(&collection)?;
        schema.validate()?;
        Ok(Self {
            node_id,
            collection,
            index: LocalIndex::shared(schema.clone()),
            schema,
            topology,
            forwarder,
            config,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn index(&self) -> Arc<Mutex<LocalIndex>> {
        self.index.clone()
    }

    pub fn topology(&self) -> &SharedClusterState {
        &self.topology
    }

    /// Builds the chain for one request.
    pub fn update_chain(&self, params: &UpdateParams) -> Result<Box<dyn UpdateProcessor>> {
        let routing = self.topology.routing_table(&self.collection)?;
        let distributed = DistributedUpdateProcessor::new(
            self.node_id.clone(),
            self.collection.clone(),
            self.schema.clone(),
            self.index.clone(),
            routing,
            self.forwarder.clone(),
            params.clone(),
        );
        let resolver = TopologyLeaderResolver::clustered(
            self.node_id.clone(),
            self.collection.clone(),
            self.schema.clone(),
            Arc::new(self.topology.clone()),
        );
        TolerantUpdateFactory::new(self.config.clone(), self.schema.clone(), Arc::new(resolver))
            .create(params, Box::new(distributed))
    }

    pub async fn handle_update(&self, request: UpdateRequest) -> UpdateResponse {
        info!(
            "node '{}' handling batch {} ({} command(s), phase {:?})",
            self.node_id,
            request.batch_id,
            request.commands.len(),
            request.params.phase
        );
        let mut chain = match self.update_chain(&request.params) {
            Ok(chain) => chain,
            Err(err) => {
                let mut rsp = UpdateResponse::new();
                rsp.error = Some(err);
                return rsp;
            }
        };
        let span = info_span!(
            "update.tolerant.batch",
            node = %self.node_id,
            batch_id = %request.batch_id,
            phase = ?request.params.phase
        );
        run_batch(chain.as_mut(), &request.commands)
            .instrument(span)
            .await
    }
}
