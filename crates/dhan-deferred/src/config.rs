//! Deferred queue configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredConfig {
    /// JSON Lines store path.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Appended lines before the store log is rewritten.
    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: usize,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/deferred_orders.jsonl")
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_compact_threshold() -> usize {
    dhan_persistence::DEFAULT_COMPACT_THRESHOLD
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            poll_interval_ms: default_poll_interval_ms(),
            compact_threshold: default_compact_threshold(),
        }
    }
}

impl DeferredConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
