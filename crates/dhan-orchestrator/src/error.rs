//! Orchestrator error taxonomy.

use dhan_catalog::CatalogError;
use dhan_client::PlacementError;
use dhan_validator::ValidationError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("Invalid input: {0}")]
    InputValidation(#[from] ValidationError),

    #[error("Instrument not found: {symbol} on {exchange}")]
    InstrumentNotFound { symbol: String, exchange: String },

    #[error("Exchange mismatch: {0}")]
    ExchangeMismatch(String),

    #[error("Quantity {quantity} of {symbol} is not a multiple of lot size {lot_size}")]
    LotSizeViolation {
        symbol: String,
        quantity: u32,
        lot_size: u32,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Broker rejected order ({code}): {message}")]
    BrokerRejected {
        code: String,
        message: String,
        order_id: Option<String>,
    },

    #[error("Malformed broker response: {0}")]
    MalformedResponse(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl OrderError {
    /// Failed before any network call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InputValidation(_)
                | Self::InstrumentNotFound { .. }
                | Self::ExchangeMismatch(_)
                | Self::LotSizeViolation { .. }
        )
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input_validation",
            Self::InstrumentNotFound { .. } => "instrument_not_found",
            Self::ExchangeMismatch(_) => "exchange_mismatch",
            Self::LotSizeViolation { .. } => "lot_size_violation",
            Self::Transport(_) => "transport",
            Self::Http { .. } => "http",
            Self::BrokerRejected { .. } => "broker_rejected",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// Order id assigned by the broker before a rejection, if any.
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::BrokerRejected { order_id, .. } => order_id.as_deref(),
            _ => None,
        }
    }
}

impl From<PlacementError> for OrderError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::Transport(msg) => Self::Transport(msg),
            PlacementError::Http { status, body } => Self::Http { status, body },
            PlacementError::BrokerRejected {
                code,
                message,
                order_id,
            } => Self::BrokerRejected {
                code,
                message,
                order_id,
            },
            PlacementError::MalformedResponse(msg) => Self::MalformedResponse(msg),
            other @ PlacementError::Setup(_) => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<CatalogError> for OrderError {
    fn from(err: CatalogError) -> Self {
        Self::Unexpected(format!("instrument catalog: {err}"))
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_partition() {
        assert!(OrderError::ExchangeMismatch("x".into()).is_local());
        assert!(OrderError::InstrumentNotFound {
            symbol: "X".into(),
            exchange: "NSE".into()
        }
        .is_local());
        assert!(!OrderError::Transport("down".into()).is_local());
        assert!(!OrderError::Unexpected("?".into()).is_local());
    }

    #[test]
    fn test_placement_error_mapping_keeps_order_id() {
        let err: OrderError = PlacementError::BrokerRejected {
            code: "REJECTED".into(),
            message: "margin".into(),
            order_id: Some("77".into()),
        }
        .into();
        assert_eq!(err.order_id(), Some("77"));
        assert_eq!(err.label(), "broker_rejected");

        let setup: OrderError = PlacementError::Setup("tls".into()).into();
        assert!(matches!(setup, OrderError::Unexpected(msg) if msg.contains("tls")));
    }
}
