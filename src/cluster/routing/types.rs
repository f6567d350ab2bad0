/// Leadership of one shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardLeader {
    pub node_id: String,
    /// Bumped on every leadership change.
    pub epoch: u64,
}

impl ShardLeader {
    /// Creates a new shard leader; epochs start at 1.
    pub fn new(node_id: impl Into<String>, epoch: u64) -> Self {
        Self {
            node_id: node_id.into(),
            epoch: epoch.max(1),
        }
    }
}

/// Where a routing key lands, seen from a given node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardRoute {
    pub shard_id: u32,
    pub leader_node_id: String,
    pub leader_epoch: u64,
    /// Whether the node asking leads the shard.
    pub local_is_leader: bool,
}

/// A change in shard leadership (migration/failover).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardMovement {
    pub shard_id: u32,
    pub previous_leader: ShardLeader,
    pub next_leader: ShardLeader,
    /// Followers after the move, the demoted leader included.
    pub followers: Vec<String>,
}
