/// Shard layout of one collection: leaders and followers per shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardRoutingTable {
    pub shard_count: u32,
    #[serde(default)]
    pub leaders: HashMap<u32, ShardLeader>,
    pub default_leader: String,
    #[serde(default)]
    pub followers: HashMap<u32, Vec<String>>,
}

// Keep routing-table behavior split by concern.
include!("routing_table/construct_and_validate.rs");
include!("routing_table/mutations.rs");
include!("routing_table/lookups.rs");
