//! # Catalog (C2)
//!
//! Purpose: Persist and look up table and shard descriptors on top of a
//! transactional metadata store (§4.2, §6 "Catalog store"). This module owns
//! (de)serialization of descriptors to the opaque bytes the store traffics
//! in; it never reasons about placement or lifecycle itself.
//!
//! Atomicity: `create_table` writes every shard row before the table row, in
//! a single transaction, so a reader observing the table row is guaranteed
//! to find all of its shard rows (§4.2). Deletion reverses the order.

use shardkv_common::{ShardKvError, ShardKvResult};
use tracing::instrument;

use crate::descriptor::{ShardDescriptor, TableDescriptor};
use crate::ports::{CatalogStore, CatalogWrite};

fn encode_table(table: &TableDescriptor) -> ShardKvResult<Vec<u8>> {
    serde_json::to_vec(table)
        .map_err(|e| ShardKvError::downstream("catalog_codec", e.to_string()))
}

fn decode_table(bytes: &[u8]) -> ShardKvResult<TableDescriptor> {
    serde_json::from_slice(bytes)
        .map_err(|e| ShardKvError::downstream("catalog_codec", e.to_string()))
}

fn encode_shard(shard: &ShardDescriptor) -> ShardKvResult<Vec<u8>> {
    serde_json::to_vec(shard)
        .map_err(|e| ShardKvError::downstream("catalog_codec", e.to_string()))
}

fn decode_shard(bytes: &[u8]) -> ShardKvResult<ShardDescriptor> {
    serde_json::from_slice(bytes)
        .map_err(|e| ShardKvError::downstream("catalog_codec", e.to_string()))
}

/// Writes every shard row and then the table row in one transaction (§4.2
/// atomicity requirement).
#[instrument(skip(store, table, shards), fields(table = %table.name, n_shards = shards.len()))]
pub async fn put_table(
    store: &dyn CatalogStore,
    table: &TableDescriptor,
    shards: &[ShardDescriptor],
) -> ShardKvResult<()> {
    let mut writes = Vec::with_capacity(shards.len() + 1);
    for shard in shards {
        writes.push(CatalogWrite::PutShard {
            shard_id: shard.shard.clone(),
            bytes: encode_shard(shard)?,
        });
    }
    writes.push(CatalogWrite::PutTable {
        name: table.name.clone(),
        bytes: encode_table(table)?,
    });
    store.transaction(writes).await
}

/// Persists a single shard row outside of table creation, e.g. when a
/// wrapper rotates buckets (`update_bucket_list` goes through this too).
pub async fn put_shard(store: &dyn CatalogStore, shard: &ShardDescriptor) -> ShardKvResult<()> {
    store
        .transaction(vec![CatalogWrite::PutShard {
            shard_id: shard.shard.clone(),
            bytes: encode_shard(shard)?,
        }])
        .await
}

/// Dirty read of a table row (§4.2 "dirty reads").
pub async fn get_table(
    store: &dyn CatalogStore,
    name: &str,
) -> ShardKvResult<TableDescriptor> {
    match store.dirty_read_table(name).await? {
        Some(bytes) => decode_table(&bytes),
        None => Err(ShardKvError::not_found("no_table", name)),
    }
}

/// Dirty read of a shard row.
pub async fn get_shard(
    store: &dyn CatalogStore,
    shard_id: &str,
) -> ShardKvResult<ShardDescriptor> {
    match store.dirty_read_shard(shard_id).await? {
        Some(bytes) => decode_shard(&bytes),
        None => Err(ShardKvError::not_found("no_table", shard_id)),
    }
}

/// Transactional read-modify-write of a shard's bucket list, as invoked by
/// the wrapper subsystem when it rotates buckets (§3 "Lifecycle").
pub async fn update_bucket_list(
    store: &dyn CatalogStore,
    shard_id: &str,
    buckets: Vec<String>,
) -> ShardKvResult<()> {
    let mut shard = get_shard(store, shard_id).await?;
    shard.buckets = Some(buckets);
    put_shard(store, &shard).await
}

/// Dirty delete of a table row.
pub async fn delete_table(store: &dyn CatalogStore, name: &str) -> ShardKvResult<()> {
    store.dirty_delete_table(name).await
}

/// Dirty delete of a shard row.
pub async fn delete_shard(store: &dyn CatalogStore, shard_id: &str) -> ShardKvResult<()> {
    store.dirty_delete_shard(shard_id).await
}
