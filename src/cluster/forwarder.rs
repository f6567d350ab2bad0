/// Delivers a sub-batch to another node of the cluster.
#[async_trait]
pub trait UpdateForwarder: Send + Sync {
    /// Returns the remote response header, or the error that escaped the
    /// remote chain (structured failures keep their metadata).
    async fn forward_batch(&self, target_node: &str, request: UpdateRequest)
    -> Result<ResponseHeader>;
}
