//! Deferred queue error types.

use dhan_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeferredError {
    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    #[error("Invalid deferred order: {0}")]
    InvalidOrder(String),
}

pub type DeferredResult<T> = Result<T, DeferredError>;
