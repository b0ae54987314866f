//! # Node Configuration
//!
//! Purpose: The node-level inputs the control plane needs but does not
//! itself own (§6 "Configuration inputs"): how many local shards a table
//! gets by default, and this node's identity within the ring/topology layer.
//! Loaded from layered sources via the `config` crate, defaults first,
//! environment overrides on top.

use serde::Deserialize;
use shardkv_common::ShardKvError;

/// Node-level configuration consumed by placement and lifecycle.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    /// Default shard count for tables that don't specify `shards` (§3).
    pub num_of_local_shards: u32,
    /// This node's identity, as used by `find_local_shards` (§4.3).
    pub node_name: String,
    /// This node's data-center id.
    pub dc_id: String,
}

impl NodeConfig {
    /// Loads configuration from (in increasing priority) a base file, an
    /// optional environment-specific file, and `SHARDKV_`-prefixed
    /// environment variables.
    pub fn load(config_dir: &str, env: &str) -> Result<Self, ShardKvError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(
                config::File::with_name(&format!("{config_dir}/{env}")).required(false),
            )
            .add_source(config::Environment::with_prefix("SHARDKV"))
            .build()
            .map_err(|e| ShardKvError::invalid_argument("bad_config", "config_dir", e.to_string()))?;

        let node_config: NodeConfig = settings
            .try_deserialize()
            .map_err(|e| ShardKvError::invalid_argument("bad_config", "config", e.to_string()))?;

        node_config.validate()?;
        Ok(node_config)
    }

    fn validate(&self) -> Result<(), ShardKvError> {
        if self.num_of_local_shards == 0 {
            return Err(ShardKvError::invalid_argument(
                "invalid_option",
                "num_of_local_shards",
                self.num_of_local_shards,
            ));
        }
        if self.node_name.is_empty() {
            return Err(ShardKvError::invalid_argument(
                "invalid_option",
                "node_name",
                "empty",
            ));
        }
        Ok(())
    }
}
