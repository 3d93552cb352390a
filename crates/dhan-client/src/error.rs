//! Placement client error types.

use thiserror::Error;

/// Remote failure classes, in the order the client checks for them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlacementError {
    /// Connection, timeout or other failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Broker refused the order. `order_id` is kept when the broker assigned one.
    #[error("broker rejected order ({code}): {message}")]
    BrokerRejected {
        code: String,
        message: String,
        order_id: Option<String>,
    },

    #[error("malformed broker response: {0}")]
    MalformedResponse(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl PlacementError {
    /// Order id the broker assigned before rejecting, if any.
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::BrokerRejected { order_id, .. } => order_id.as_deref(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, PlacementError>;
