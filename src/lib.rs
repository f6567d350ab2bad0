// ============================================================================
// ShardIndex Library
// ============================================================================
//
// Tolerant batch writes for a sharded, replicated document index.

pub mod core;
pub mod update;
pub mod tolerant;
pub mod cluster;

// Re-export main types for convenience
pub use core::{
    DistributedUpdatesError, ErrorCode, FailureMetadata, FieldType, IndexDocument, IndexError,
    IndexSchema, RemoteUpdateError, Result, SchemaField, UpdateFailure,
};
pub use update::{
    AddCommand, DeleteCommand, DistributionPhase, LocalIndex, LocalIndexProcessor, UpdateCommand,
    UpdateParams, UpdateProcessor, UpdateRequest, UpdateResponse, run_batch,
};

// Re-export the tolerant update chain
pub use tolerant::{
    ERROR_METADATA_PREFIX, ErrorEntry, ErrorKind, ErrorRecord, FailureAggregator, LeaderResolver,
    ResponseHeader, TolerantBatchSession, TolerantUpdateConfig, TolerantUpdateFactory,
    TopologyLeaderResolver, UNKNOWN_ID, fold_distributed_errors,
};

// Re-export cluster simulation
pub use cluster::{
    ClusterMembership, ClusterNode, ClusterSpec, ClusterState, InMemoryForwarder,
    SharedClusterState, ShardLeader, ShardMovement, ShardRoute, ShardRoutingTable,
    SimulatedCluster, TopologyProvider, UpdateForwarder, stable_shard_for,
};
