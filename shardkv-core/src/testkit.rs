//! # Testkit
//!
//! Purpose: In-memory fakes for every external port (§6), so the control
//! plane can be exercised end-to-end without a real ring, topology layer, or
//! ordered backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use shardkv_common::{ShardKvError, ShardKvResult};

use crate::descriptor::{Comparator, WrapperSpec};
use crate::ports::{
    CatalogStore, CatalogWrite, Continuation, OrderedBackend, Placement, RingClient, RingEntry,
    ShardRangeReply, ShardRangeRequest, TopologyClient, Wrapper,
};

/// A ring that never distributes anything: single-DC, single-node,
/// deterministic. Enough to exercise placement without a real consistent
/// hash.
#[derive(Default)]
pub struct InMemoryRing {
    inner: Mutex<HashMap<String, Vec<Placement>>>,
    node: String,
    dc: String,
}

impl InMemoryRing {
    pub fn new(node: impl Into<String>, dc: impl Into<String>) -> Self {
        InMemoryRing {
            inner: Mutex::new(HashMap::new()),
            node: node.into(),
            dc: dc.into(),
        }
    }
}

#[async_trait]
impl RingClient for InMemoryRing {
    async fn create_ring(&self, _name: &str, _shards: &[String], _local: bool) -> ShardKvResult<()> {
        Ok(())
    }

    async fn allocate_nodes(
        &self,
        shards: &[String],
        _replication_factor: u32,
    ) -> ShardKvResult<Vec<(String, RingEntry)>> {
        let mut entry = RingEntry::new();
        entry.insert(self.dc.clone(), vec![self.node.clone()]);
        Ok(shards.iter().map(|s| (s.clone(), entry.clone())).collect())
    }

    async fn get_nodes(&self, name: &str) -> ShardKvResult<Option<Vec<Placement>>> {
        Ok(self.inner.lock().get(name).cloned())
    }

    async fn delete_ring(&self, name: &str) -> ShardKvResult<()> {
        self.inner.lock().remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> ShardKvResult<bool> {
        Ok(self.inner.lock().contains_key(name))
    }
}

/// A topology layer that always succeeds locally and never actually fans
/// out across a network; used to test the revert-on-failure wiring by
/// flipping `fail_next`.
#[derive(Default)]
pub struct InMemoryTopology {
    fail_next: Mutex<bool>,
}

impl InMemoryTopology {
    pub fn new() -> Self {
        InMemoryTopology::default()
    }

    pub fn fail_next_call(&self) {
        *self.fail_next.lock() = true;
    }
}

#[async_trait]
impl TopologyClient for InMemoryTopology {
    async fn topo_call(
        &self,
        table: &str,
        _op: crate::ports::RevertableOp,
        _timeout_ms: u64,
    ) -> ShardKvResult<()> {
        let mut fail = self.fail_next.lock();
        if *fail {
            *fail = false;
            return Err(ShardKvError::transient(format!("topology_timeout:{table}")));
        }
        Ok(())
    }

    async fn map_shards_seq(
        &self,
        _shards: &[Placement],
        _request: ShardRangeRequest,
    ) -> ShardKvResult<Vec<ShardRangeReply>> {
        Ok(Vec::new())
    }
}

/// A `BTreeMap`-backed ordered backend: one independent store per shard id,
/// sorted by backend-encoded key bytes.
#[derive(Default)]
pub struct InMemoryBackend {
    stores: Mutex<HashMap<String, std::collections::BTreeMap<Vec<u8>, Vec<u8>>>>,
    deleted: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend::default()
    }

    pub fn put(&self, shard: &str, key: Vec<u8>, value: Vec<u8>) {
        self.stores
            .lock()
            .entry(shard.to_string())
            .or_default()
            .insert(key, value);
    }

    pub fn was_deleted(&self, shard: &str) -> bool {
        self.deleted.lock().iter().any(|s| s == shard)
    }
}

#[async_trait]
impl OrderedBackend for InMemoryBackend {
    async fn open(
        &self,
        shard: &str,
        _comparator: Comparator,
        create_if_missing: bool,
        error_if_exists: bool,
    ) -> ShardKvResult<()> {
        let mut stores = self.stores.lock();
        let exists = stores.contains_key(shard);
        if exists && error_if_exists {
            return Err(ShardKvError::conflict("shard_exists", shard));
        }
        if !exists && !create_if_missing {
            return Err(ShardKvError::not_found("no_shard", shard));
        }
        stores.entry(shard.to_string()).or_default();
        Ok(())
    }

    async fn read_range_binary(
        &self,
        shard: &str,
        start: &[u8],
        stop: &[u8],
        chunk: usize,
    ) -> ShardKvResult<ShardRangeReply> {
        let stores = self.stores.lock();
        let store = stores
            .get(shard)
            .ok_or_else(|| ShardKvError::not_found("no_shard", shard))?;
        let mut items: Vec<_> = store
            .range(start.to_vec()..=stop.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let cont = if items.len() > chunk {
            let cont_key = items[chunk].0.clone();
            items.truncate(chunk);
            Continuation::Key(cont_key)
        } else {
            Continuation::Complete
        };
        Ok(ShardRangeReply { items, cont })
    }

    async fn read_range_n_binary(
        &self,
        shard: &str,
        start: &[u8],
        n: usize,
    ) -> ShardKvResult<ShardRangeReply> {
        let stores = self.stores.lock();
        let store = stores
            .get(shard)
            .ok_or_else(|| ShardKvError::not_found("no_shard", shard))?;
        let items: Vec<_> = store
            .range(start.to_vec()..)
            .take(n)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(ShardRangeReply {
            items,
            cont: Continuation::Complete,
        })
    }

    async fn approximate_size(&self, shard: &str) -> ShardKvResult<u64> {
        let stores = self.stores.lock();
        let store = stores
            .get(shard)
            .ok_or_else(|| ShardKvError::not_found("no_shard", shard))?;
        Ok(store.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum())
    }

    async fn delete_db(&self, shard: &str) -> ShardKvResult<()> {
        self.stores.lock().remove(shard);
        self.deleted.lock().push(shard.to_string());
        Ok(())
    }

    async fn close(&self, _shard: &str) -> ShardKvResult<()> {
        Ok(())
    }
}

/// A wrapper that rotates through `num_of_buckets` deterministically-named
/// buckets and tracks which shards/buckets it has torn down.
#[derive(Default)]
pub struct InMemoryWrapper {
    buckets: Mutex<HashMap<String, Vec<String>>>,
    closed: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl InMemoryWrapper {
    pub fn new() -> Self {
        InMemoryWrapper::default()
    }

    pub fn was_closed(&self, shard: &str) -> bool {
        self.closed.lock().iter().any(|s| s == shard)
    }

    pub fn was_deleted(&self, shard: &str) -> bool {
        self.deleted.lock().iter().any(|s| s == shard)
    }
}

#[async_trait]
impl Wrapper for InMemoryWrapper {
    async fn create_bucket_list(
        &self,
        shard: &str,
        wrapper: &WrapperSpec,
    ) -> ShardKvResult<Vec<String>> {
        let buckets: Vec<String> = (0..wrapper.num_of_buckets)
            .map(|i| format!("{shard}_bucket{i}"))
            .collect();
        Ok(buckets)
    }

    async fn init_buckets(
        &self,
        shard: &str,
        buckets: &[String],
        _wrapper: &WrapperSpec,
    ) -> ShardKvResult<()> {
        self.buckets
            .lock()
            .insert(shard.to_string(), buckets.to_vec());
        Ok(())
    }

    async fn read_range_binary(
        &self,
        shard: &str,
        _start: &[u8],
        _stop: &[u8],
        _chunk: usize,
        _dir: u8,
    ) -> ShardKvResult<ShardRangeReply> {
        if !self.buckets.lock().contains_key(shard) {
            return Err(ShardKvError::not_found("no_shard", shard));
        }
        Ok(ShardRangeReply {
            items: Vec::new(),
            cont: Continuation::Complete,
        })
    }

    async fn close_shard(&self, shard: &str) -> ShardKvResult<()> {
        self.closed.lock().push(shard.to_string());
        Ok(())
    }

    async fn delete_shard(&self, shard: &str) -> ShardKvResult<()> {
        self.buckets.lock().remove(shard);
        self.deleted.lock().push(shard.to_string());
        Ok(())
    }
}

/// An in-memory stand-in for the transactional catalog store (§6 "Catalog
/// store"). `transaction` applies every write atomically under one lock;
/// dirty reads/deletes bypass it entirely.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    tables: Mutex<HashMap<String, Vec<u8>>>,
    shards: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        InMemoryCatalogStore::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn transaction(&self, writes: Vec<CatalogWrite>) -> ShardKvResult<()> {
        let mut tables = self.tables.lock();
        let mut shards = self.shards.lock();
        for write in writes {
            match write {
                CatalogWrite::PutTable { name, bytes } => {
                    tables.insert(name, bytes);
                }
                CatalogWrite::PutShard { shard_id, bytes } => {
                    shards.insert(shard_id, bytes);
                }
            }
        }
        Ok(())
    }

    async fn dirty_read_table(&self, name: &str) -> ShardKvResult<Option<Vec<u8>>> {
        Ok(self.tables.lock().get(name).cloned())
    }

    async fn dirty_read_shard(&self, shard_id: &str) -> ShardKvResult<Option<Vec<u8>>> {
        Ok(self.shards.lock().get(shard_id).cloned())
    }

    async fn dirty_delete_table(&self, name: &str) -> ShardKvResult<()> {
        self.tables.lock().remove(name);
        Ok(())
    }

    async fn dirty_delete_shard(&self, shard_id: &str) -> ShardKvResult<()> {
        self.shards.lock().remove(shard_id);
        Ok(())
    }
}
