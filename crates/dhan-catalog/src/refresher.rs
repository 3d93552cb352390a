//! Instrument master download.
//!
//! Fetches the broker's master CSV, replaces the local copy atomically
//! (temp file + rename) and records when it happened in a sidecar
//! metadata file used for staleness checks.

use crate::config::meta_path_for;
use crate::error::{CatalogError, CatalogResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Sidecar metadata written next to the master file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterMeta {
    /// RFC 3339 timestamp. Naive ISO timestamps are read as UTC.
    pub last_updated: String,
    pub source: String,
}

impl MasterMeta {
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_updated)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&self.last_updated, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

/// Age of the local master: metadata timestamp first, file mtime second.
///
/// Returns `None` when the master file does not exist.
pub fn master_age(master_path: &Path) -> Option<Duration> {
    if !master_path.exists() {
        return None;
    }

    let meta_path = meta_path_for(master_path);
    let from_meta = std::fs::read_to_string(&meta_path)
        .ok()
        .and_then(|text| serde_json::from_str::<MasterMeta>(&text).ok())
        .and_then(|meta| meta.last_updated_at());

    if let Some(updated) = from_meta {
        let age = Utc::now().signed_duration_since(updated);
        return Some(age.to_std().unwrap_or(Duration::ZERO));
    }

    std::fs::metadata(master_path)
        .and_then(|m| m.modified())
        .ok()
        .map(|modified| {
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO)
        })
}

/// Downloads the instrument master.
pub struct MasterRefresher {
    client: Client,
    source_url: String,
    master_path: PathBuf,
}

impl MasterRefresher {
    /// Create a refresher.
    ///
    /// # Arguments
    /// * `source_url` - Remote CSV location
    /// * `master_path` - Local CSV path to replace
    /// * `timeout` - Whole-request timeout
    pub fn new(
        source_url: impl Into<String>,
        master_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Refresh(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            source_url: source_url.into(),
            master_path: master_path.into(),
        })
    }

    /// Download the master and write it plus its metadata.
    ///
    /// # Returns
    /// Path of the refreshed master file.
    pub async fn refresh(&self) -> CatalogResult<PathBuf> {
        info!(url = %self.source_url, "Downloading instrument master");

        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| CatalogError::Refresh(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Refresh(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Refresh(format!("Failed to read body: {e}")))?;
        if body.is_empty() {
            return Err(CatalogError::Refresh("empty master body".to_string()));
        }

        if let Some(parent) = self.master_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.master_path.with_extension("csv.part");
        tokio::fs::write(&tmp_path, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.master_path).await {
            warn!(?e, "Failed to move downloaded master into place");
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        let meta = MasterMeta {
            last_updated: Utc::now().to_rfc3339(),
            source: self.source_url.clone(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)?;
        tokio::fs::write(meta_path_for(&self.master_path), meta_json).await?;

        info!(
            path = %self.master_path.display(),
            bytes = body.len(),
            "Instrument master refreshed"
        );
        Ok(self.master_path.clone())
    }
}
