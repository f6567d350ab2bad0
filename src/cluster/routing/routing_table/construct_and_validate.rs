impl ShardRoutingTable {
    /// Creates a table where `default_leader` leads every shard.
    pub fn new(shard_count: u32, default_leader: impl Into<String>) -> Result<Self> {
        let default_leader = default_leader.into();
        if shard_count == 0 {
            return Err(IndexError::Routing("shard_count must be >= 1".to_string()));
        }
        if default_leader.trim().is_empty() {
            return Err(IndexError::Routing(
                "default_leader must not be empty".to_string(),
            ));
        }

        Ok(Self {
            shard_count,
            leaders: HashMap::new(),
            default_leader,
            followers: HashMap::new(),
        })
    }

    /// Checks shard indices, node ids, epochs, and that no follower is also
    /// the leader or listed twice.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(IndexError::Routing("shard_count must be >= 1".to_string()));
        }
        if self.default_leader.trim().is_empty() {
            return Err(IndexError::Routing(
                "default_leader must not be empty".to_string(),
            ));
        }
        for (shard, leader) in &self.leaders {
            self.check_shard(*shard)?;
            if leader.node_id.trim().is_empty() {
                return Err(IndexError::Routing(format!(
                    "Leader node id for shard {} must not be empty",
                    shard
                )));
            }
            if leader.epoch == 0 {
                return Err(IndexError::Routing(format!(
                    "Leader epoch for shard {} must be >= 1",
                    shard
                )));
            }
        }

        for (shard, followers) in &self.followers {
            self.check_shard(*shard)?;
            let leader = self.leader_for_shard(*shard);
            let mut dedupe = HashSet::new();
            for follower in followers {
                if follower.trim().is_empty() || follower == &leader.node_id {
                    return Err(IndexError::Routing(format!(
                        "Invalid follower '{}' for shard {} led by '{}'",
                        follower, shard, leader.node_id
                    )));
                }
                if !dedupe.insert(follower) {
                    return Err(IndexError::Routing(format!(
                        "Follower '{}' appears more than once for shard {}",
                        follower, shard
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_shard(&self, shard_id: u32) -> Result<()> {
        if shard_id >= self.shard_count {
            return Err(IndexError::Routing(format!(
                "Shard {} is out of range for shard_count {}",
                shard_id, self.shard_count
            )));
        }
        Ok(())
    }
}
