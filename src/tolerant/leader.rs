/// Decides whether this node may tolerate a failure of a command, i.e.
/// whether it leads the shard that owns the command.
pub trait LeaderResolver: Send + Sync {
    fn is_authoritative(&self, target: RouteTarget<'_>, route: Option<&str>) -> Result<bool>;
}

/// `LeaderResolver` backed by the cluster topology.
///
/// Without a topology the node runs standalone and is authoritative for
/// everything.
pub struct TopologyLeaderResolver {
    node_id: String,
    collection: String,
    schema: Arc<IndexSchema>,
    topology: Option<Arc<dyn TopologyProvider>>,
}

impl TopologyLeaderResolver {
    pub fn standalone(schema: Arc<IndexSchema>) -> Self {
        Self {
            node_id: String::new(),
            collection: String::new(),
            schema,
            topology: None,
        }
    }

    pub fn clustered(
        node_id: impl Into<String>,
        collection: impl Into<String>,
        schema: Arc<IndexSchema>,
        topology: Arc<dyn TopologyProvider>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            collection: collection.into(),
            schema,
            topology: Some(topology),
        }
    }

    pub fn is_standalone(&self) -> bool {
        self.topology.is_none()
    }
}

impl LeaderResolver for TopologyLeaderResolver {
    fn is_authoritative(&self, target: RouteTarget<'_>, route: Option<&str>) -> Result<bool> {
        let Some(topology) = self.topology.as_ref() else {
            return Ok(true);
        };

        // A query without a route override reaches every shard; leading any
        // of them makes this node one of the deciding leaders.
        let routed = route.is_some_and(|route| !route.trim().is_empty());
        if matches!(target, RouteTarget::Query(_)) && !routed {
            let led = topology.shards_led_by(&self.collection, &self.node_id)?;
            return Ok(!led.is_empty());
        }

        let routing_key = target.routing_key(&self.schema, route)?;
        let shard = topology.route_for(&self.collection, &routing_key, &self.node_id)?;
        Ok(shard.local_is_leader)
    }
}
