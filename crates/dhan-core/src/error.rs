//! Error types for dhan-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Unknown {field} value: {value}")]
    UnknownEnumValue { field: &'static str, value: String },

    #[error("Invalid exchange: {0}")]
    InvalidExchange(String),

    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
