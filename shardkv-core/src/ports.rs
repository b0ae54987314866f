//! # External Ports
//!
//! Purpose: Trait boundaries for the collaborators §1 and §6 place explicitly
//! out of scope — the ring layer, the distributed topology layer, the
//! per-shard ordered backend worker, the bucket wrapper, and the
//! transactional catalog store. This crate only ever calls these traits; it
//! never implements the hash ring, RPC fanout, or on-disk storage itself.
//!
//! A `testkit` module of in-memory fakes lives alongside these traits so the
//! control-plane logic can be exercised without a real ring, topology layer,
//! or backend.

use std::collections::HashMap;

use async_trait::async_trait;
use shardkv_common::ShardKvResult;

use crate::descriptor::{Comparator, WrapperSpec};

/// DC identifier -> nodes in that DC holding a replica (§4.3, §6 ring layer).
pub type RingEntry = HashMap<String, Vec<String>>;

/// A single shard's placement: its id and, for distributed tables, its ring
/// entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub shard_id: String,
    pub ring_entry: Option<RingEntry>,
}

/// The consistent-hash ring (§6 "Ring layer"). Out of scope to implement;
/// this crate only consumes `allocate_nodes`/`delete_ring`/`exists`.
#[async_trait]
pub trait RingClient: Send + Sync {
    async fn create_ring(
        &self,
        name: &str,
        shards: &[String],
        local: bool,
    ) -> ShardKvResult<()>;

    /// Assigns each shard to `rf` nodes spread across data centers.
    async fn allocate_nodes(
        &self,
        shards: &[String],
        replication_factor: u32,
    ) -> ShardKvResult<Vec<(String, RingEntry)>>;

    async fn get_nodes(&self, name: &str) -> ShardKvResult<Option<Vec<Placement>>>;

    async fn delete_ring(&self, name: &str) -> ShardKvResult<()>;

    async fn exists(&self, name: &str) -> ShardKvResult<bool>;
}

/// A distributed operation expressed as a forward action plus its inverse,
/// invoked on any node-level failure (§4.4, §9 "Revert-on-failure"). `delete`
/// has no revert — deletion is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertableOp {
    CreateTable,
    OpenTable,
    CloseTable,
    DeleteTable,
}

/// The distributed topology/RPC layer (§6 "Topology layer"). Fans out a call
/// to every node owning a table, with a 10s timeout and revert-on-failure.
#[async_trait]
pub trait TopologyClient: Send + Sync {
    /// Runs `op` on every node that owns `table`, reverting on any
    /// node-level failure (except `DeleteTable`, which has no revert).
    async fn topo_call(
        &self,
        table: &str,
        op: RevertableOp,
        timeout_ms: u64,
    ) -> ShardKvResult<()>;

    /// One successful reply per shard, from whichever replica answers first.
    async fn map_shards_seq(
        &self,
        shards: &[Placement],
        request: ShardRangeRequest,
    ) -> ShardKvResult<Vec<ShardRangeReply>>;
}

/// A single shard's range request, as dispatched to either the ordered
/// backend directly (local, non-wrapped) or the wrapper (wrapped shards) or
/// the topology layer (distributed) (§4.6 step 3).
#[derive(Debug, Clone)]
pub enum ShardRangeRequest {
    Bounded {
        start: Vec<u8>,
        stop: Vec<u8>,
        chunk: usize,
        dir: u8,
    },
    Bounded2 {
        start: Vec<u8>,
        n: usize,
    },
}

/// A shard's raw reply: a sorted run of `(key_bytes, value_bytes)` pairs plus
/// either `Complete` or a continuation key to resume from (§4.6 step 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRangeReply {
    pub items: Vec<(Vec<u8>, Vec<u8>)>,
    pub cont: Continuation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Complete,
    Key(Vec<u8>),
}

/// The per-shard ordered backend worker (§6 "Ordered backend"). Each shard
/// owns exactly one handle; no other component opens or closes it (§5
/// "Shared resources").
#[async_trait]
pub trait OrderedBackend: Send + Sync {
    async fn open(
        &self,
        shard: &str,
        comparator: Comparator,
        create_if_missing: bool,
        error_if_exists: bool,
    ) -> ShardKvResult<()>;

    async fn read_range_binary(
        &self,
        shard: &str,
        start: &[u8],
        stop: &[u8],
        chunk: usize,
    ) -> ShardKvResult<ShardRangeReply>;

    async fn read_range_n_binary(
        &self,
        shard: &str,
        start: &[u8],
        n: usize,
    ) -> ShardKvResult<ShardRangeReply>;

    async fn approximate_size(&self, shard: &str) -> ShardKvResult<u64>;

    async fn delete_db(&self, shard: &str) -> ShardKvResult<()>;

    async fn close(&self, shard: &str) -> ShardKvResult<()>;
}

/// The bucket wrapper for `ordered_wrapped` shards (§6 "Wrapper"). Drives
/// bucket rotation; this crate only calls the interface, never implements
/// rotation policy (a Non-goal: "in-memory caching... no policy specified"
/// extends by analogy to bucket rotation policy).
#[async_trait]
pub trait Wrapper: Send + Sync {
    async fn create_bucket_list(
        &self,
        shard: &str,
        wrapper: &WrapperSpec,
    ) -> ShardKvResult<Vec<String>>;

    async fn init_buckets(
        &self,
        shard: &str,
        buckets: &[String],
        wrapper: &WrapperSpec,
    ) -> ShardKvResult<()>;

    async fn read_range_binary(
        &self,
        shard: &str,
        start: &[u8],
        stop: &[u8],
        chunk: usize,
        dir: u8,
    ) -> ShardKvResult<ShardRangeReply>;

    async fn close_shard(&self, shard: &str) -> ShardKvResult<()>;

    async fn delete_shard(&self, shard: &str) -> ShardKvResult<()>;
}

/// The transactional metadata store backing the catalog (§6 "Catalog
/// store"). `shardkv-core`'s `catalog` module builds `put_table`/`get_table`/
/// etc. on top of this; it never talks to a database directly.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn transaction(
        &self,
        writes: Vec<CatalogWrite>,
    ) -> ShardKvResult<()>;

    async fn dirty_read_table(&self, name: &str) -> ShardKvResult<Option<Vec<u8>>>;

    async fn dirty_read_shard(&self, shard_id: &str) -> ShardKvResult<Option<Vec<u8>>>;

    async fn dirty_delete_table(&self, name: &str) -> ShardKvResult<()>;

    async fn dirty_delete_shard(&self, shard_id: &str) -> ShardKvResult<()>;
}

/// One write inside a catalog transaction. Serialized payloads are opaque to
/// the store (`enterdb_table`/`enterdb_stab` in the external store's terms);
/// the catalog module owns (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWrite {
    PutTable { name: String, bytes: Vec<u8> },
    PutShard { shard_id: String, bytes: Vec<u8> },
}

