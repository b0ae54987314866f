// shardkv-common - Shared error type, value model, and name validation for
// the sharded ordered-KV control plane.
//
// Small, dependency-light types shared by every other crate in the
// workspace.

pub mod error;
pub mod field;
pub mod names;

pub use error::{ShardKvError, ShardKvResult};
pub use field::FieldValue;
