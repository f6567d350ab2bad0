//! Simulated cluster plumbing: topology, routing, forwarding, and the
//! distributed processor that fans a batch out to shard leaders.

use crate::core::{
    DistributedUpdatesError, IndexError, IndexSchema, RemoteUpdateError, Result,
};
use crate::tolerant::{
    ResponseHeader, TolerantUpdateConfig, TolerantUpdateFactory, TopologyLeaderResolver,
};
use crate::update::{
    AddCommand, DeleteCommand, DistributionPhase, LocalIndex, RouteTarget, UpdateCommand,
    UpdateParams, UpdateProcessor, UpdateRequest, UpdateResponse, run_batch,
};
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::Mutex;
use tracing::{Instrument, info_span};

// Cluster support is split by responsibility for easier navigation.
include!("cluster/routing.rs");
include!("cluster/topology.rs");
include!("cluster/forwarder.rs");
include!("cluster/distributed.rs");
include!("cluster/node.rs");
include!("cluster/in_memory_forwarder.rs");
include!("cluster/simulation.rs");
