//! Bulk processor error types.

use dhan_client::PlacementError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("Session {session} already has an active bulk job ({job_id})")]
    JobActive { session: String, job_id: String },

    #[error("Unknown bulk job: {0}")]
    UnknownJob(String),

    #[error("Bulk input has no rows")]
    EmptyInput,

    #[error("Gateway setup failed: {0}")]
    Gateway(#[from] PlacementError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type BulkResult<T> = Result<T, BulkError>;
