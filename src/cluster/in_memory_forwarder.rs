/// In-process `UpdateForwarder` for tests and the simulation tool.
///
/// Peers are held weakly: dropping a node makes it unreachable, the way a
/// crashed process would be.
#[derive(Clone, Default)]
pub struct InMemoryForwarder {
    peers: Arc<Mutex<HashMap<String, Weak<ClusterNode>>>>,
}

impl InMemoryForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_peer(&self, node: &Arc<ClusterNode>) -> Result<()> {
        let node_id = node.node_id().to_string();
        if node_id.trim().is_empty() {
            return Err(IndexError::Routing("node_id must not be empty".to_string()));
        }
        self.peers.lock().await.insert(node_id, Arc::downgrade(node));
        Ok(())
    }

    async fn peer(&self, node_id: &str) -> Result<Arc<ClusterNode>> {
        let peers = self.peers.lock().await;
        let peer = peers.get(node_id).ok_or_else(|| {
            IndexError::Transport(format!(
                "Update forwarder target node '{}' is not registered",
                node_id
            ))
        })?;
        peer.upgrade().ok_or_else(|| {
            IndexError::Transport(format!("Update forwarder target node '{}' is down", node_id))
        })
    }
}

#[async_trait]
impl UpdateForwarder for InMemoryForwarder {
    async fn forward_batch(
        &self,
        target_node: &str,
        request: UpdateRequest,
    ) -> Result<ResponseHeader> {
        if request.params.phase == DistributionPhase::None {
            return Err(IndexError::InternalContract(format!(
                "batch {} forwarded to '{}' without a distribution phase",
                request.batch_id, target_node
            )));
        }
        let peer = self.peer(target_node).await?;
        peer.handle_update(request).await.into_result()
    }
}
