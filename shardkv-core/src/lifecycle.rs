//! # Shard Lifecycle (C4)
//!
//! Purpose: Create/open/close/delete shards, dispatching by shard type, and
//! manage wrapped buckets (§4.4). Distributed table-level operations add a
//! topology fan-out with a 10s timeout and revert-on-failure on top of the
//! same per-shard primitives.

use std::sync::Arc;
use std::time::Duration;

use shardkv_common::{ShardKvError, ShardKvResult};
use tracing::instrument;

use crate::catalog;
use crate::descriptor::{ShardDescriptor, TableDescriptor, TableType};
use crate::placement;
use crate::ports::{
    CatalogStore, OrderedBackend, Placement, RevertableOp, RingClient, TopologyClient, Wrapper,
};

/// Timeout for a distributed topology call (§4.4, §5 "10 s timeout").
pub const TOPOLOGY_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates one local shard: builds `S` from `T`, computes buckets via the
/// wrapper for wrapped shards, persists `S`, then opens the backend (or the
/// wrapper's per-bucket backends) with `create_if_missing=true,
/// error_if_exists=true` (§4.4).
#[instrument(skip(backend, wrapper, table), fields(table = %table.name, shard_id = %shard_id))]
pub async fn create_shard(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    table: &TableDescriptor,
    shard_id: String,
) -> ShardKvResult<ShardDescriptor> {
    let mut shard = ShardDescriptor::from_table(table, shard_id.clone());

    match table.table_type {
        TableType::OrderedWrapped => {
            let wrapper = wrapper.ok_or_else(|| {
                ShardKvError::invalid_argument("invalid_option", "wrapper", "missing_wrapper_port")
            })?;
            let spec = table.wrapper.as_ref().ok_or_else(|| {
                ShardKvError::invalid_argument("invalid_option", "wrapper", "missing_wrapper_spec")
            })?;
            let buckets = wrapper.create_bucket_list(&shard_id, spec).await?;
            wrapper.init_buckets(&shard_id, &buckets, spec).await?;
            for bucket in &buckets {
                backend
                    .open(bucket, table.comparator, true, true)
                    .await?;
            }
            shard.buckets = Some(buckets);
        }
        TableType::Ordered => {
            backend.open(&shard_id, table.comparator, true, true).await?;
        }
    }

    Ok(shard)
}

/// Opens an existing local shard: `create_if_missing=false,
/// error_if_exists=false` (§4.4).
#[instrument(skip(backend, wrapper, shard), fields(shard_id = %shard.shard))]
pub async fn open_shard(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    shard: &ShardDescriptor,
    comparator: crate::descriptor::Comparator,
) -> ShardKvResult<()> {
    match (&shard.buckets, wrapper) {
        (Some(buckets), Some(wrapper)) => {
            let spec = shard.wrapper.as_ref().ok_or_else(|| {
                ShardKvError::invalid_argument("invalid_option", "wrapper", "missing_wrapper_spec")
            })?;
            wrapper.init_buckets(&shard.shard, buckets, spec).await?;
            for bucket in buckets {
                backend.open(bucket, comparator, false, false).await?;
            }
        }
        _ => {
            backend.open(&shard.shard, comparator, false, false).await?;
        }
    }
    Ok(())
}

/// Closes a local shard, terminating the per-shard worker; wrapped shards
/// close through the wrapper, which closes every bucket (§4.4).
#[instrument(skip(backend, wrapper, shard), fields(shard_id = %shard.shard))]
pub async fn close_shard(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    shard: &ShardDescriptor,
) -> ShardKvResult<()> {
    match wrapper {
        Some(wrapper) if shard.buckets.is_some() => wrapper.close_shard(&shard.shard).await,
        _ => backend.close(&shard.shard).await,
    }
}

/// Deletes a local shard's on-disk data (via the backend, or the wrapper's
/// `delete_shard` for wrapped shards) and removes `S` from the catalog
/// (§4.4).
#[instrument(skip(backend, wrapper, store, shard), fields(shard_id = %shard.shard))]
pub async fn delete_shard(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    store: &dyn CatalogStore,
    shard: &ShardDescriptor,
) -> ShardKvResult<()> {
    match wrapper {
        Some(wrapper) if shard.buckets.is_some() => wrapper.delete_shard(&shard.shard).await?,
        _ => backend.delete_db(&shard.shard).await?,
    }
    catalog::delete_shard(store, &shard.shard).await
}

/// Local (non-distributed) `create_table`: places shards via the ring (or
/// locally, for non-distributed tables), creates each one, and persists the
/// table and shard rows atomically (§4.2 "shard rows before table row").
pub async fn create_table_local(
    ring: Option<&dyn RingClient>,
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    store: &dyn CatalogStore,
    mut table: TableDescriptor,
) -> ShardKvResult<TableDescriptor> {
    let placements = if table.distributed {
        let ring = ring.ok_or_else(|| {
            ShardKvError::invalid_argument("invalid_option", "distributed", "no_ring_client")
        })?;
        placement::allocate(ring, &table.name, table.num_shards, table.replication_factor).await?
    } else {
        placement::allocate_local(&table.name, table.num_shards)
    };

    let mut shards = Vec::with_capacity(placements.len());
    for p in &placements {
        shards.push(create_shard(backend, wrapper, &table, p.shard_id.clone()).await?);
    }

    table.shards = placements
        .into_iter()
        .map(|p| crate::descriptor::PlacedShard {
            shard_id: p.shard_id,
            ring_entry: p.ring_entry,
        })
        .collect();

    catalog::put_table(store, &table, &shards).await?;
    Ok(table)
}

fn placements_of(table: &TableDescriptor) -> Vec<Placement> {
    table
        .shards
        .iter()
        .map(|s| Placement {
            shard_id: s.shard_id.clone(),
            ring_entry: s.ring_entry.clone(),
        })
        .collect()
}

/// Opens every local shard of an existing table: catalog lookup, placement
/// filtered down to this node, then `open_shard` per shard (§2 control flow
/// "`open_table` ... → Catalog lookup → Placement (local filter) → Shard
/// Lifecycle").
#[instrument(skip(backend, wrapper, store), fields(table = %table_name))]
pub async fn open_table_local(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    store: &dyn CatalogStore,
    table_name: &str,
    this_node: &str,
    this_dc: &str,
) -> ShardKvResult<()> {
    let table = catalog::get_table(store, table_name).await?;
    let local = placement::find_local_shards(&placements_of(&table), this_node, this_dc);
    for p in &local {
        let shard = catalog::get_shard(store, &p.shard_id).await?;
        open_shard(backend, wrapper, &shard, table.comparator).await?;
    }
    Ok(())
}

/// Closes every local shard of a table: same Catalog lookup -> Placement
/// (local filter) -> Shard Lifecycle shape as `open_table_local` (§2).
#[instrument(skip(backend, wrapper, store), fields(table = %table_name))]
pub async fn close_table_local(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    store: &dyn CatalogStore,
    table_name: &str,
    this_node: &str,
    this_dc: &str,
) -> ShardKvResult<()> {
    let table = catalog::get_table(store, table_name).await?;
    let local = placement::find_local_shards(&placements_of(&table), this_node, this_dc);
    for p in &local {
        let shard = catalog::get_shard(store, &p.shard_id).await?;
        close_shard(backend, wrapper, &shard).await?;
    }
    Ok(())
}

/// Deletes every local shard of a table and then the table row itself:
/// Catalog lookup -> Placement (local filter) -> Shard Lifecycle, finishing
/// with the catalog's table row (§2, §8 S6).
#[instrument(skip(backend, wrapper, store), fields(table = %table_name))]
pub async fn delete_table_local(
    backend: &dyn OrderedBackend,
    wrapper: Option<&dyn Wrapper>,
    store: &dyn CatalogStore,
    table_name: &str,
    this_node: &str,
    this_dc: &str,
) -> ShardKvResult<()> {
    let table = catalog::get_table(store, table_name).await?;
    let local = placement::find_local_shards(&placements_of(&table), this_node, this_dc);
    for p in &local {
        let shard = catalog::get_shard(store, &p.shard_id).await?;
        delete_shard(backend, wrapper, store, &shard).await?;
    }
    catalog::delete_table(store, table_name).await
}

/// Distributed table-level operation: fans out `op` to every node owning
/// `table` via the topology layer, with a 10s timeout and revert-on-failure
/// on any node-level error (§4.4). `delete_table` has no revert — deletion
/// is terminal (§9 "Revert-on-failure").
#[instrument(skip(topology), fields(table = %table_name, ?op))]
pub async fn run_distributed(
    topology: &dyn TopologyClient,
    table_name: &str,
    op: RevertableOp,
) -> ShardKvResult<()> {
    topology
        .topo_call(table_name, op, TOPOLOGY_TIMEOUT.as_millis() as u64)
        .await
}

/// Creates a distributed table: first distributes the ring with commit-id
/// semantics (rolled back on failure), then — only if that succeeds —
/// proceeds to shard creation across every owning node (§4.4).
pub async fn create_table_distributed(
    ring: &dyn RingClient,
    topology: &dyn TopologyClient,
    table: &TableDescriptor,
) -> ShardKvResult<()> {
    let shard_ids: Vec<String> = table
        .shards
        .iter()
        .map(|s| s.shard_id.clone())
        .collect();

    ring.create_ring(&table.name, &shard_ids, false)
        .await
        .map_err(|e| {
            ShardKvError::transient(format!("ring_commit_failed: {}", e.reason()))
        })?;

    match run_distributed(topology, &table.name, RevertableOp::CreateTable).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Revert: roll the ring back before surfacing the failure.
            let _ = ring.delete_ring(&table.name).await;
            Err(e)
        }
    }
}

/// Runs `op` distributed, invoking `revert` on every node on failure (§4.4,
/// §9 "Revert-on-failure"). `delete_table` passes `revert: None`, since
/// deletion is terminal.
async fn run_distributed_reverting(
    topology: &dyn TopologyClient,
    table_name: &str,
    op: RevertableOp,
    revert: Option<RevertableOp>,
) -> ShardKvResult<()> {
    match run_distributed(topology, table_name, op).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(revert) = revert {
                let _ = run_distributed(topology, table_name, revert).await;
            }
            Err(e)
        }
    }
}

/// Opens a distributed table: fans out to every owning node, reverting with
/// `close_table` on any node-level failure (§4.4).
pub async fn open_table_distributed(
    topology: &dyn TopologyClient,
    table_name: &str,
) -> ShardKvResult<()> {
    run_distributed_reverting(
        topology,
        table_name,
        RevertableOp::OpenTable,
        Some(RevertableOp::CloseTable),
    )
    .await
}

/// Closes a distributed table: fans out to every owning node, reverting with
/// `open_table` on any node-level failure (§4.4).
pub async fn close_table_distributed(
    topology: &dyn TopologyClient,
    table_name: &str,
) -> ShardKvResult<()> {
    run_distributed_reverting(
        topology,
        table_name,
        RevertableOp::CloseTable,
        Some(RevertableOp::OpenTable),
    )
    .await
}

/// Deletes a distributed table: fans out to every owning node and tears down
/// the ring entry. No revert — deletion is terminal (§4.4, §9).
pub async fn delete_table_distributed(
    ring: &dyn RingClient,
    topology: &dyn TopologyClient,
    table_name: &str,
) -> ShardKvResult<()> {
    run_distributed(topology, table_name, RevertableOp::DeleteTable).await?;
    ring.delete_ring(table_name).await
}

/// Wires the catalog + backend port together to form an in-process handle
/// other components can share, so every caller for a given shard talks to
/// the same backend instance.
pub struct ShardHandle {
    pub backend: Arc<dyn OrderedBackend>,
    pub wrapper: Option<Arc<dyn Wrapper>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Comparator, DataModel, TimeMargin, TimeUnit, WrapperSpec};
    use crate::testkit::{
        InMemoryBackend, InMemoryCatalogStore, InMemoryRing, InMemoryTopology, InMemoryWrapper,
    };

    fn table_fixture(table_type: TableType) -> TableDescriptor {
        TableDescriptor {
            name: "t1".into(),
            key: vec!["x".into()],
            columns: vec!["y".into()],
            indexes: vec![],
            num_shards: 2,
            shards: vec![],
            distributed: false,
            replication_factor: 1,
            table_type,
            data_model: DataModel::Binary,
            comparator: Comparator::Ascending,
            wrapper: match table_type {
                TableType::OrderedWrapped => Some(WrapperSpec {
                    num_of_buckets: 3,
                    time_margin: Some(TimeMargin {
                        unit: TimeUnit::Hours,
                        amount: 1,
                    }),
                    size_margin: None,
                }),
                TableType::Ordered => None,
            },
            time_series: false,
        }
    }

    #[tokio::test]
    async fn s1_create_table_local_materializes_three_shards() {
        let backend = InMemoryBackend::new();
        let store = InMemoryCatalogStore::new();
        let mut table = table_fixture(TableType::Ordered);
        table.num_shards = 3;

        let created = create_table_local(None, &backend, None, &store, table)
            .await
            .unwrap();

        assert_eq!(created.shards.len(), 3);
        assert_eq!(created.shards[0].shard_id, "t1_shard0");
        for s in &created.shards {
            let fetched = catalog::get_shard(&store, &s.shard_id).await.unwrap();
            assert_eq!(fetched.name, "t1");
        }
        let fetched_table = catalog::get_table(&store, "t1").await.unwrap();
        assert_eq!(fetched_table.name, "t1");
    }

    #[tokio::test]
    async fn wrapped_shard_creation_initializes_buckets() {
        let backend = InMemoryBackend::new();
        let wrapper = InMemoryWrapper::new();
        let store = InMemoryCatalogStore::new();
        let mut table = table_fixture(TableType::OrderedWrapped);
        table.num_shards = 1;

        let created = create_table_local(None, &backend, Some(&wrapper), &store, table)
            .await
            .unwrap();

        let shard_id = &created.shards[0].shard_id;
        let fetched = catalog::get_shard(&store, shard_id).await.unwrap();
        assert!(fetched.buckets.is_some());
        assert_eq!(fetched.buckets.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn s6_delete_table_removes_every_shard_and_backend_store() {
        let backend = InMemoryBackend::new();
        let store = InMemoryCatalogStore::new();
        let mut table = table_fixture(TableType::Ordered);
        table.num_shards = 2;

        let created = create_table_local(None, &backend, None, &store, table)
            .await
            .unwrap();

        delete_table_local(&backend, None, &store, "t1", "n1", "dc1")
            .await
            .unwrap();

        assert!(catalog::get_table(&store, "t1").await.is_err());
        for placed in &created.shards {
            assert!(catalog::get_shard(&store, &placed.shard_id).await.is_err());
            assert!(backend.was_deleted(&placed.shard_id));
        }
    }

    #[tokio::test]
    async fn open_table_local_opens_every_local_shard() {
        let backend = InMemoryBackend::new();
        let store = InMemoryCatalogStore::new();
        let mut table = table_fixture(TableType::Ordered);
        table.num_shards = 2;

        create_table_local(None, &backend, None, &store, table)
            .await
            .unwrap();

        // Opening an already-open shard fails `error_if_exists=false,
        // create_if_missing=false` only if absent; re-opening must succeed.
        open_table_local(&backend, None, &store, "t1", "n1", "dc1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn close_then_open_table_local_round_trips() {
        let backend = InMemoryBackend::new();
        let store = InMemoryCatalogStore::new();
        let mut table = table_fixture(TableType::Ordered);
        table.num_shards = 2;

        create_table_local(None, &backend, None, &store, table)
            .await
            .unwrap();

        close_table_local(&backend, None, &store, "t1", "n1", "dc1")
            .await
            .unwrap();
        open_table_local(&backend, None, &store, "t1", "n1", "dc1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn open_table_distributed_reverts_with_close_on_failure() {
        let topology = InMemoryTopology::new();
        topology.fail_next_call();

        let err = open_table_distributed(&topology, "t1").await.unwrap_err();
        assert_eq!(err.reason(), "topology_timeout:t1");
    }

    #[tokio::test]
    async fn delete_table_distributed_fans_out_and_tears_down_the_ring() {
        let ring = InMemoryRing::new("n1", "dc1");
        let topology = InMemoryTopology::new();

        delete_table_distributed(&ring, &topology, "t1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_table_distributed_surfaces_topology_failure() {
        let ring = InMemoryRing::new("n1", "dc1");
        let topology = InMemoryTopology::new();
        topology.fail_next_call();

        let err = delete_table_distributed(&ring, &topology, "t1")
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "topology_timeout:t1");
    }

    #[tokio::test]
    async fn distributed_create_rolls_back_ring_on_topology_failure() {
        let ring = InMemoryRing::new("n1", "dc1");
        let topology = InMemoryTopology::new();
        topology.fail_next_call();

        let mut table = table_fixture(TableType::Ordered);
        table.shards = vec![crate::descriptor::PlacedShard {
            shard_id: "t1_shard0".into(),
            ring_entry: None,
        }];

        let err = create_table_distributed(&ring, &topology, &table)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "topology_timeout:t1");
    }

    #[tokio::test]
    async fn distributed_create_succeeds_when_topology_call_succeeds() {
        let ring = InMemoryRing::new("n1", "dc1");
        let topology = InMemoryTopology::new();

        let mut table = table_fixture(TableType::Ordered);
        table.shards = vec![crate::descriptor::PlacedShard {
            shard_id: "t1_shard0".into(),
            ring_entry: None,
        }];

        create_table_distributed(&ring, &topology, &table)
            .await
            .unwrap();
    }
}
