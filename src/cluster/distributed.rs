/// Commands waiting to be delivered to one node when the batch finishes.
#[derive(Debug)]
struct PendingBatch {
    target_node: String,
    phase: DistributionPhase,
    commands: Vec<UpdateCommand>,
}

/// Routes each command of a batch across the cluster.
///
/// A delete-by-query goes to every shard leader unless the request carries a
/// route, in which case it is owned by the routed shard alone. Commands for
/// shards this node leads are applied to the local index right
/// away and queued for the shard's followers. Commands owned by another
/// leader are queued for that leader. Queued sub-batches are delivered
/// concurrently from `finish`, so their failures only surface there, as one
/// `DistributedUpdatesError`.
pub struct DistributedUpdateProcessor {
    node_id: String,
    collection: String,
    schema: Arc<IndexSchema>,
    index: Arc<Mutex<LocalIndex>>,
    routing: ShardRoutingTable,
    forwarder: Arc<dyn UpdateForwarder>,
    params: UpdateParams,
    pending: Vec<PendingBatch>,
}

impl DistributedUpdateProcessor {
    pub fn new(
        node_id: impl Into<String>,
        collection: impl Into<String>,
        schema: Arc<IndexSchema>,
        index: Arc<Mutex<LocalIndex>>,
        routing: ShardRoutingTable,
        forwarder: Arc<dyn UpdateForwarder>,
        params: UpdateParams,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            collection: collection.into(),
            schema,
            index,
            routing,
            forwarder,
            params,
            pending: Vec::new(),
        }
    }

    fn defer(&mut self, target_node: &str, phase: DistributionPhase, command: UpdateCommand) {
        match self
            .pending
            .iter_mut()
            .find(|batch| batch.target_node == target_node && batch.phase == phase)
        {
            Some(batch) => batch.commands.push(command),
            None => self.pending.push(PendingBatch {
                target_node: target_node.to_string(),
                phase,
                commands: vec![command],
            }),
        }
    }

    async fn apply_locally(&self, command: &UpdateCommand) -> Result<()> {
        let mut index = self.index.lock().await;
        match command {
            UpdateCommand::Add(cmd) => index.add(cmd),
            UpdateCommand::Delete(cmd) => index.delete(cmd).map(|_| ()),
        }
    }

    fn replicate(&mut self, shard_id: u32, command: &UpdateCommand) {
        for follower in self.routing.followers_for_shard(shard_id) {
            self.defer(&follower, DistributionPhase::FromLeader, command.clone());
        }
    }

    async fn distribute(&mut self, command: UpdateCommand) -> Result<()> {
        let phase = self.params.phase;
        if phase == DistributionPhase::FromLeader {
            return self.apply_locally(&command).await;
        }

        let routed = self
            .params
            .route
            .as_deref()
            .is_some_and(|route| !route.trim().is_empty());
        if !routed && matches!(command.route_target(), RouteTarget::Query(_)) {
            // Other leaders get the query even when it fails here.
            if phase == DistributionPhase::None {
                for leader in self.routing.leader_nodes() {
                    if leader != self.node_id {
                        self.defer(&leader, DistributionPhase::ToLeader, command.clone());
                    }
                }
            }
            let led = self.routing.shards_led_by(&self.node_id);
            if !led.is_empty() {
                self.apply_locally(&command).await?;
                let followers = led
                    .into_iter()
                    .flat_map(|shard_id| self.routing.followers_for_shard(shard_id))
                    .collect::<BTreeSet<_>>();
                for follower in followers {
                    self.defer(&follower, DistributionPhase::FromLeader, command.clone());
                }
            }
            return Ok(());
        }

        let routing_key = command
            .route_target()
            .routing_key(&self.schema, self.params.route.as_deref())?;
        let route = self
            .routing
            .route_for(&self.collection, &routing_key, &self.node_id);

        if route.local_is_leader {
            self.apply_locally(&command).await?;
            self.replicate(route.shard_id, &command);
            Ok(())
        } else if phase == DistributionPhase::ToLeader {
            Err(IndexError::Routing(format!(
                "Node '{}' is not the leader of shard {}; current leader is '{}'@{}",
                self.node_id, route.shard_id, route.leader_node_id, route.leader_epoch
            )))
        } else {
            let leader = route.leader_node_id.clone();
            self.defer(&leader, DistributionPhase::ToLeader, command);
            Ok(())
        }
    }
}

#[async_trait]
impl UpdateProcessor for DistributedUpdateProcessor {
    async fn process_add(&mut self, cmd: &AddCommand) -> Result<()> {
        self.distribute(UpdateCommand::Add(cmd.clone())).await
    }

    async fn process_delete(&mut self, cmd: &DeleteCommand) -> Result<()> {
        self.distribute(UpdateCommand::Delete(cmd.clone())).await
    }

    async fn finish(&mut self, _rsp: &mut UpdateResponse) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let deliveries = pending.into_iter().map(|batch| {
            let forwarder = self.forwarder.clone();
            let params = self.params.clone().phase(batch.phase);
            async move {
                debug!(
                    "delivering {} command(s) to '{}' as {:?}",
                    batch.commands.len(),
                    batch.target_node,
                    batch.phase
                );
                let request = UpdateRequest::new(batch.commands, params);
                let result = forwarder.forward_batch(&batch.target_node, request).await;
                (batch.target_node, result)
            }
        });

        let errors = join_all(deliveries)
            .await
            .into_iter()
            .filter_map(|(node_id, result)| {
                result
                    .err()
                    .map(|error| RemoteUpdateError { node_id, error })
            })
            .collect::<Vec<_>>();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DistributedUpdatesError::new(errors).into())
        }
    }
}
