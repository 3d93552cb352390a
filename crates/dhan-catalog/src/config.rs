//! Catalog configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default master download location.
pub const DEFAULT_MASTER_URL: &str =
    "https://images.dhan.co/api-data/api-scrip-master-detailed.csv";

/// How the catalog holds the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogMode {
    /// Full table plus symbol, security-id and derivative indexes.
    #[default]
    InMemory,
    /// No table; lookups scan the file in chunks and fill a bounded cache.
    Streaming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Local master CSV path.
    #[serde(default = "default_master_path")]
    pub master_path: PathBuf,
    /// Remote master CSV URL.
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default)]
    pub mode: CatalogMode,
    /// Rows per chunk in streaming scans.
    #[serde(default = "default_stream_chunk_rows")]
    pub stream_chunk_rows: usize,
    /// Symbol keys kept by the streaming cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Master older than this is refreshed before loading.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
    /// Download timeout in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_master_path() -> PathBuf {
    PathBuf::from("data/dhan_instruments.csv")
}

fn default_source_url() -> String {
    DEFAULT_MASTER_URL.to_string()
}

fn default_stream_chunk_rows() -> usize {
    50_000
}

fn default_cache_capacity() -> usize {
    4_096
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_auto_refresh() -> bool {
    true
}

fn default_download_timeout_secs() -> u64 {
    20
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            master_path: default_master_path(),
            source_url: default_source_url(),
            mode: CatalogMode::default(),
            stream_chunk_rows: default_stream_chunk_rows(),
            cache_capacity: default_cache_capacity(),
            max_age_hours: default_max_age_hours(),
            auto_refresh: default_auto_refresh(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }

    /// Sidecar metadata path: `foo.csv` -> `foo_meta.json`.
    pub fn meta_path(&self) -> PathBuf {
        meta_path_for(&self.master_path)
    }
}

pub fn meta_path_for(master: &std::path::Path) -> PathBuf {
    let stem = master
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instruments".to_string());
    master.with_file_name(format!("{stem}_meta.json"))
}
