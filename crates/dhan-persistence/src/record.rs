//! Deferred order record.

use chrono::{DateTime, Utc};
use dhan_core::{Credentials, ExchangeCode, ExchangeSegment, Price, RawOrder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored error messages are cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeferredStatus {
    Pending,
    Placed,
    Failed,
}

impl DeferredStatus {
    /// Placed and failed records are never polled again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for DeferredStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Placed => "placed",
            Self::Failed => "failed",
        })
    }
}

/// A conditional order waiting for its trigger band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredOrderRecord {
    pub id: String,
    pub status: DeferredStatus,
    pub symbol: String,
    pub exchange: ExchangeCode,
    pub security_id: String,
    pub segment: ExchangeSegment,
    pub trigger_price: Price,
    /// Band half-width in percent.
    pub tolerance_pct: Decimal,
    pub last_price: Option<Price>,
    /// Order placed once the band is hit.
    pub payload: RawOrder,
    /// Session that enqueued the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    pub order_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeferredOrderRecord {
    /// New pending record with a generated id.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        symbol: impl Into<String>,
        exchange: ExchangeCode,
        security_id: impl Into<String>,
        segment: ExchangeSegment,
        trigger_price: Price,
        tolerance_pct: Decimal,
        payload: RawOrder,
        credentials: Option<Credentials>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: DeferredStatus::Pending,
            symbol: symbol.into(),
            exchange,
            security_id: security_id.into(),
            segment,
            trigger_price,
            tolerance_pct,
            last_price: None,
            payload,
            credentials,
            order_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeferredStatus::Pending
    }
}

/// Cut `message` to [`MAX_ERROR_CHARS`] characters.
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_CHARS) {
        Some((cut, _)) => message[..cut].to_string(),
        None => message.to_string(),
    }
}
