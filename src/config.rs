use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pool construction parameters
///
/// The defaults give a pool of 16 resources whose `acquire` waits
/// indefinitely for capacity. Configs can be built directly, through
/// [`PoolConfigBuilder`], or deserialized from a host application's
/// configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct PoolConfig {
    /// Maximum number of live resources, idle and checked out combined
    ///
    /// Must be at least 1.
    #[builder(default = "16")]
    pub max_size: usize,

    /// How long `acquire` waits for capacity before giving up
    ///
    /// `None` waits indefinitely. `acquire_timeout` on the pool overrides
    /// this per call.
    #[builder(default)]
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            acquire_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a config with the given capacity and no acquire deadline
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }
}
