//! # Table & Shard Descriptors
//!
//! Purpose: The canonical, validated shape a table or shard takes once it
//! has passed the validator (§4.1) and been placed (§4.3). Every other
//! component — catalog, lifecycle, codec, fanout — operates purely on these
//! types; none of them re-derive table shape from raw option lists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shardkv_common::FieldValue;

/// Backend type a table is stored under. Both variants use the same ordered
/// backend (§4.4); only `OrderedWrapped` adds bucket rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    Ordered,
    OrderedWrapped,
}

/// How non-key columns are serialized (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataModel {
    Binary,
    Array,
    Hash,
}

/// Key sort direction. Encoding is always ascending-byte-order (Design Notes
/// §9); `Descending` is handled by reversing merge direction, not the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Ascending,
    Descending,
}

impl Comparator {
    /// `dir` as used by the wrapper/backend RPC surface (§4.6 step 1): `1`
    /// for ascending, `0` for descending.
    pub fn dir(&self) -> u8 {
        match self {
            Comparator::Ascending => 1,
            Comparator::Descending => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub fn as_seconds(&self, amount: u32) -> u64 {
        let amount = amount as u64;
        match self {
            TimeUnit::Seconds => amount,
            TimeUnit::Minutes => amount * 60,
            TimeUnit::Hours => amount * 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeMargin {
    pub unit: TimeUnit,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeMargin {
    pub megabytes: u32,
}

/// Bucket rotation policy for `OrderedWrapped` tables (§3 "wrapper").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WrapperSpec {
    pub num_of_buckets: u32,
    pub time_margin: Option<TimeMargin>,
    pub size_margin: Option<SizeMargin>,
}

/// A ring-allocated shard: its id and (for distributed tables) the DC ->
/// node assignment the ring produced for it (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedShard {
    pub shard_id: String,
    pub ring_entry: Option<RingEntry>,
}

/// DC identifier -> the nodes in that DC holding a replica of the shard.
pub type RingEntry = HashMap<String, Vec<String>>;

/// Canonical, immutable-after-creation table descriptor (§3 "Table
/// descriptor (T)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub key: Vec<String>,
    /// Data columns: the validated `columns` list with `key` fields removed
    /// and any `indexes` fields appended if not already present (§4.1).
    pub columns: Vec<String>,
    pub indexes: Vec<String>,
    /// Requested shard count. Set by the validator; `shards` below is empty
    /// until Shard Placement (§4.3) materializes it.
    pub num_shards: u32,
    pub shards: Vec<PlacedShard>,
    pub distributed: bool,
    pub replication_factor: u32,
    pub table_type: TableType,
    pub data_model: DataModel,
    pub comparator: Comparator,
    pub wrapper: Option<WrapperSpec>,
    pub time_series: bool,
}

impl TableDescriptor {
    /// The designated timestamp field for a time-series table: by decision
    /// (DESIGN.md, resolving spec §3's open-ended "designated timestamp
    /// component"), this is the last field of `key`. Hashing for ring
    /// placement excludes it; sorting includes it.
    pub fn time_series_field(&self) -> Option<&str> {
        if self.time_series {
            self.key.last().map(String::as_str)
        } else {
            None
        }
    }
}

/// Per-shard descriptor (§3 "Shard descriptor (S)"). `buckets` is the only
/// field mutable after creation, via `update_bucket_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub shard: String,
    pub name: String,
    pub table_type: TableType,
    pub key: Vec<String>,
    pub columns: Vec<String>,
    pub indexes: Vec<String>,
    pub comparator: Comparator,
    pub data_model: DataModel,
    pub wrapper: Option<WrapperSpec>,
    /// `Some` only for `OrderedWrapped` shards; the live bucket ids in
    /// rotation order.
    pub buckets: Option<Vec<String>>,
}

impl ShardDescriptor {
    pub fn from_table(table: &TableDescriptor, shard_id: String) -> Self {
        ShardDescriptor {
            shard: shard_id,
            name: table.name.clone(),
            table_type: table.table_type,
            key: table.key.clone(),
            columns: table.columns.clone(),
            indexes: table.indexes.clone(),
            comparator: table.comparator,
            data_model: table.data_model,
            wrapper: table.wrapper.clone(),
            buckets: match table.table_type {
                TableType::OrderedWrapped => Some(Vec::new()),
                TableType::Ordered => None,
            },
        }
    }
}

/// A single field name/value pair, as supplied by or returned to a caller
/// (as opposed to `FieldValue` alone, which doesn't carry a name).
pub type Fields = Vec<(String, FieldValue)>;
