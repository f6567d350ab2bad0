/// Nodes allowed to lead or follow shards.
///
/// A leader named by a cluster spec or a leader move must be a member;
/// followers are not checked, since an unreachable follower only costs a
/// logged delivery failure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ClusterMembership {
    #[serde(default)]
    nodes: BTreeSet<String>,
}

impl ClusterMembership {
    /// Builds a membership from node ids; blank ids are rejected.
    pub fn new(nodes: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut membership = Self::default();
        for node in nodes {
            membership.add_node(node)?;
        }
        Ok(membership)
    }

    /// Adds a node. Adding a known node again is a no-op.
    pub fn add_node(&mut self, node_id: impl Into<String>) -> Result<()> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(IndexError::Routing(
                "membership node_id must not be empty".to_string(),
            ));
        }
        self.nodes.insert(node_id);
        Ok(())
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    /// Fails with a routing error naming `role` when `node_id` is not a member.
    pub fn require_member(&self, node_id: &str, role: &str) -> Result<()> {
        if self.contains(node_id) {
            return Ok(());
        }
        Err(IndexError::Routing(format!(
            "{} '{}' is not part of cluster membership",
            role, node_id
        )))
    }
}
