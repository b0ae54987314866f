//! # Shard Placement (C3)
//!
//! Purpose: Generate shard names for a table and allocate them to nodes via
//! the ring, then filter a placed sequence down to the shards a given node
//! owns (§4.3). This component never talks to storage; it only names and
//! places.

use shardkv_common::ShardKvResult;

use crate::ports::{Placement, RingClient};

/// Generates `n_shards` ids of the form `<name>_shard<i>` and allocates them
/// to `replication_factor` nodes each via the ring (§4.3).
pub async fn allocate(
    ring: &dyn RingClient,
    name: &str,
    n_shards: u32,
    replication_factor: u32,
) -> ShardKvResult<Vec<Placement>> {
    let shard_ids = shard_ids(name, n_shards);
    let allocated = ring.allocate_nodes(&shard_ids, replication_factor).await?;
    Ok(allocated
        .into_iter()
        .map(|(shard_id, ring_entry)| Placement {
            shard_id,
            ring_entry: Some(ring_entry),
        })
        .collect())
}

/// Generates shard ids for a local-only table: no ring entries are attached
/// (§4.3 "`allocate_local`... yields only shard ids without ring entries").
pub fn allocate_local(name: &str, n_shards: u32) -> Vec<Placement> {
    shard_ids(name, n_shards)
        .into_iter()
        .map(|shard_id| Placement {
            shard_id,
            ring_entry: None,
        })
        .collect()
}

fn shard_ids(name: &str, n_shards: u32) -> Vec<String> {
    (0..n_shards).map(|i| format!("{name}_shard{i}")).collect()
}

/// Filters `shards` down to those whose ring entry's DC list contains
/// `this_node`. Local tables (no ring entries at all) pass through
/// unchanged, matching "if the input is already a flat list... it is
/// returned unchanged" (§4.3).
pub fn find_local_shards(
    shards: &[Placement],
    this_node: &str,
    this_dc: &str,
) -> Vec<Placement> {
    if shards.iter().all(|p| p.ring_entry.is_none()) {
        return shards.to_vec();
    }
    shards
        .iter()
        .filter(|p| {
            p.ring_entry
                .as_ref()
                .and_then(|entry| entry.get(this_dc))
                .is_some_and(|nodes| nodes.iter().any(|n| n == this_node))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn generates_sequential_shard_ids() {
        let placed = allocate_local("t1", 3);
        let ids: Vec<_> = placed.iter().map(|p| p.shard_id.clone()).collect();
        assert_eq!(ids, vec!["t1_shard0", "t1_shard1", "t1_shard2"]);
        assert!(placed.iter().all(|p| p.ring_entry.is_none()));
    }

    #[test]
    fn local_filter_passes_through_flat_list() {
        let placed = allocate_local("t1", 2);
        let local = find_local_shards(&placed, "n1", "dc1");
        assert_eq!(local, placed);
    }

    #[test]
    fn local_filter_selects_matching_dc_entries() {
        let mut entry_a = HashMap::new();
        entry_a.insert("dc1".to_string(), vec!["n1".to_string(), "n2".to_string()]);
        let mut entry_b = HashMap::new();
        entry_b.insert("dc1".to_string(), vec!["n3".to_string()]);

        let placed = vec![
            Placement {
                shard_id: "t1_shard0".into(),
                ring_entry: Some(entry_a),
            },
            Placement {
                shard_id: "t1_shard1".into(),
                ring_entry: Some(entry_b),
            },
        ];

        let local = find_local_shards(&placed, "n1", "dc1");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].shard_id, "t1_shard0");
    }
}
