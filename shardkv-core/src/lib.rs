//! # shardkv-core
//!
//! The control plane and range-fanout core of a sharded, optionally
//! distributed ordered key/value store: table/shard lifecycle, placement,
//! the key/value codec, and parallel range fanout, with no network-facing
//! surface of its own.
//!
//! ## Module map
//!
//! - [`validator`] — C1, checks and normalizes `create_table` arguments.
//! - [`catalog`] — C2, persists and looks up table/shard descriptors.
//! - [`placement`] — C3, names and allocates shards via the ring.
//! - [`lifecycle`] — C4, creates/opens/closes/deletes shards.
//! - [`codec`] — C5, encodes/decodes keys and values.
//! - [`fanout`] — C6, the parallel range-read merge core.
//! - [`descriptor`] — the canonical table/shard types every other module
//!   operates on.
//! - [`ports`] — trait boundaries for the ring, topology layer, ordered
//!   backend, wrapper, and catalog store — all out of scope to implement.
//! - [`config`] — node-level configuration (`num_of_local_shards`, node
//!   identity, DC id).
//! - [`testkit`] — in-memory fakes of every port, for tests.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod fanout;
pub mod lifecycle;
pub mod placement;
pub mod ports;
pub mod testkit;
pub mod validator;

pub use descriptor::{
    Comparator, DataModel, Fields, PlacedShard, ShardDescriptor, TableDescriptor, TableType,
    TimeMargin, TimeUnit, WrapperSpec,
};
pub use fanout::{RangeContinuation, RangeResult, Row};
pub use ports::{
    CatalogStore, Continuation, OrderedBackend, Placement, RevertableOp, RingClient,
    ShardRangeReply, ShardRangeRequest, TopologyClient, Wrapper,
};
pub use validator::{verify_create_table_args, CreateTableArgs, OptionValue};
