//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use transition_core::limits::{DEFAULT_RECOMPUTE_TIMEOUT_SECS, DEFAULT_TOP_N};

/// Transition engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for a full project recompute in seconds
    #[serde(default = "default_recompute_timeout_secs")]
    pub recompute_timeout_secs: u64,
    /// Run a full recompute before building a graph for a project with no transitions
    #[serde(default = "default_auto_materialize")]
    pub auto_materialize: bool,
    /// Result size for top-K queries when the caller does not pass one
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
}

fn default_recompute_timeout_secs() -> u64 {
    DEFAULT_RECOMPUTE_TIMEOUT_SECS
}

fn default_auto_materialize() -> bool {
    true
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recompute_timeout_secs: default_recompute_timeout_secs(),
            auto_materialize: default_auto_materialize(),
            default_top_n: default_top_n(),
        }
    }
}

impl EngineConfig {
    pub fn recompute_timeout(&self) -> Duration {
        Duration::from_secs(self.recompute_timeout_secs)
    }
}
