//! Broker acknowledgement of a placed order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementStatus {
    Pending,
    Transit,
    Confirmed,
    Traded,
    PartTraded,
    Triggered,
    Cancelled,
    Expired,
    Rejected,
    /// Anything the broker sends that is not listed above.
    Unknown,
}

impl PlacementStatus {
    /// Parse the broker's `orderStatus` field; unrecognized values map to `Unknown`.
    pub fn from_broker(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "TRANSIT" => Self::Transit,
            "CONFIRMED" | "CONFIRM" => Self::Confirmed,
            "TRADED" => Self::Traded,
            "PART_TRADED" => Self::PartTraded,
            "TRIGGERED" => Self::Triggered,
            "CANCELLED" => Self::Cancelled,
            "EXPIRED" => Self::Expired,
            "REJECTED" => Self::Rejected,
            _ => Self::Unknown,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

impl fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Transit => "TRANSIT",
            Self::Confirmed => "CONFIRMED",
            Self::Traded => "TRADED",
            Self::PartTraded => "PART_TRADED",
            Self::Triggered => "TRIGGERED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
            Self::Rejected => "REJECTED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Successful placement as classified by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub order_id: String,
    pub status: PlacementStatus,
    /// Response body exactly as received.
    pub raw: serde_json::Value,
    pub error_code: Option<String>,
}
