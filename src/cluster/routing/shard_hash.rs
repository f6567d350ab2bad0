const FNV_OFFSET_BASIS: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

/// Part of a routing key that decides placement.
///
/// Composite keys (`tenant!doc-1`) are placed by their prefix so that every
/// document of a tenant lands on the same shard.
pub fn route_prefix(routing_key: &str) -> &str {
    match routing_key.split_once('!') {
        Some((prefix, _)) if !prefix.is_empty() => prefix,
        _ => routing_key,
    }
}

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stable shard id for a routing key within a collection.
pub fn stable_shard_for(collection: &str, routing_key: &str, shard_count: u32) -> u32 {
    if shard_count == 0 {
        return 0;
    }
    let hash = fnv1a(FNV_OFFSET_BASIS, collection.as_bytes());
    let hash = fnv1a(hash, &[0xff]);
    let hash = fnv1a(hash, route_prefix(routing_key).as_bytes());
    (hash % shard_count as u64) as u32
}
