//! Catalog error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Instrument master not found at {0}")]
    MasterMissing(PathBuf),

    #[error("Master refresh failed: {0}")]
    Refresh(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
