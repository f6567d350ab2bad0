impl ShardRoutingTable {
    /// Replicas of the shard, excluding its leader.
    pub fn followers_for_shard(&self, shard_id: u32) -> Vec<String> {
        self.followers.get(&shard_id).cloned().unwrap_or_default()
    }

    /// Leader falls back to `default_leader` at epoch 1 when the shard has no override.
    pub fn leader_for_shard(&self, shard_id: u32) -> ShardLeader {
        self.leaders
            .get(&shard_id)
            .cloned()
            .unwrap_or_else(|| ShardLeader::new(self.default_leader.clone(), 1))
    }

    /// Shard owning `routing_key`; see `stable_shard_for`.
    pub fn shard_for(&self, collection: &str, routing_key: &str) -> u32 {
        stable_shard_for(collection, routing_key, self.shard_count)
    }

    /// Shards whose current leader is `node_id`, ascending.
    pub fn shards_led_by(&self, node_id: &str) -> Vec<u32> {
        (0..self.shard_count)
            .filter(|shard| self.leader_for_shard(*shard).node_id == node_id)
            .collect()
    }

    /// Distinct leader nodes across all shards, sorted.
    pub fn leader_nodes(&self) -> Vec<String> {
        (0..self.shard_count)
            .map(|shard| self.leader_for_shard(shard).node_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolves the shard and current leader for a routing key.
    pub fn route_for(&self, collection: &str, routing_key: &str, local_node_id: &str) -> ShardRoute {
        let shard_id = self.shard_for(collection, routing_key);
        let leader = self.leader_for_shard(shard_id);

        ShardRoute {
            shard_id,
            local_is_leader: leader.node_id == local_node_id,
            leader_node_id: leader.node_id,
            leader_epoch: leader.epoch,
        }
    }
}
