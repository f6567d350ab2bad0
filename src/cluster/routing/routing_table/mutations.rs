impl ShardRoutingTable {
    /// Sets a shard's leader and epoch. A follower promoted this way leaves
    /// the follower list.
    pub fn set_shard_leader(
        &mut self,
        shard_id: u32,
        node_id: impl Into<String>,
        epoch: u64,
    ) -> Result<()> {
        self.check_shard(shard_id)?;
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(IndexError::Routing("node_id must not be empty".to_string()));
        }

        if let Some(followers) = self.followers.get_mut(&shard_id) {
            followers.retain(|follower| follower != &node_id);
        }
        self.leaders.insert(shard_id, ShardLeader::new(node_id, epoch));
        Ok(())
    }

    /// Replaces a shard's followers. Duplicates are dropped; the leader
    /// itself is rejected.
    pub fn set_shard_followers(&mut self, shard_id: u32, followers: Vec<String>) -> Result<()> {
        self.check_shard(shard_id)?;

        let leader = self.leader_for_shard(shard_id);
        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for follower in followers {
            let follower = follower.trim().to_string();
            if follower.is_empty() {
                return Err(IndexError::Routing(
                    "follower node id must not be empty".to_string(),
                ));
            }
            if follower == leader.node_id {
                return Err(IndexError::Routing(format!(
                    "Follower '{}' for shard {} cannot be the current leader",
                    follower, shard_id
                )));
            }
            if seen.insert(follower.clone()) {
                normalized.push(follower);
            }
        }

        if normalized.is_empty() {
            self.followers.remove(&shard_id);
        } else {
            self.followers.insert(shard_id, normalized);
        }
        Ok(())
    }

    /// Moves shard leadership to `new_leader` and bumps the leader epoch.
    ///
    /// The previous leader is demoted to follower.
    pub fn move_shard_leader(
        &mut self,
        shard_id: u32,
        new_leader: impl Into<String>,
        membership: Option<&ClusterMembership>,
    ) -> Result<ShardMovement> {
        self.check_shard(shard_id)?;

        let new_leader = new_leader.into();
        if new_leader.trim().is_empty() {
            return Err(IndexError::Routing("new_leader must not be empty".to_string()));
        }
        if let Some(membership) = membership {
            membership.require_member(&new_leader, "Shard move rejected: leader")?;
        }

        let previous_leader = self.leader_for_shard(shard_id);
        let mut followers = self.followers_for_shard(shard_id);
        followers.retain(|node| node != &new_leader);
        if previous_leader.node_id != new_leader
            && !followers
                .iter()
                .any(|node| node == previous_leader.node_id.as_str())
        {
            followers.push(previous_leader.node_id.clone());
        }

        let next_leader = ShardLeader::new(new_leader, previous_leader.epoch.saturating_add(1));
        self.leaders.insert(shard_id, next_leader.clone());
        if followers.is_empty() {
            self.followers.remove(&shard_id);
        } else {
            self.followers.insert(shard_id, followers.clone());
        }

        Ok(ShardMovement {
            shard_id,
            previous_leader,
            next_leader,
            followers,
        })
    }
}
