//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker credentials are not configured")]
    MissingCredentials,

    #[error("Catalog error: {0}")]
    Catalog(#[from] dhan_catalog::CatalogError),

    #[error("Order error: {0}")]
    Order(#[from] dhan_orchestrator::OrderError),

    #[error("Bulk error: {0}")]
    Bulk(#[from] dhan_bulk::BulkError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] dhan_persistence::PersistenceError),

    #[error("Deferred queue error: {0}")]
    Deferred(#[from] dhan_deferred::DeferredError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] dhan_client::PlacementError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] dhan_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
