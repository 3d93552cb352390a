//! Inbound order shapes.
//!
//! `RawOrder` is the loosely-typed order as it arrives from a form, a bulk
//! row or a deferred payload. The validator turns it into an `OrderIntent`,
//! which is the only thing placement code consumes.

use crate::decimal::Price;
use crate::instrument::{ExchangeCode, OptionType};
use crate::order::{CorrelationTag, OrderFlag, OrderKind, OrderSide, OrderType, ProductType, Validity};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// RawOrder
// =============================================================================

/// Unvalidated order fields.
///
/// Strings are kept as received (untrimmed, any case). Numbers are already
/// parsed; the bulk reader reports unparseable cells before building this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawOrder {
    /// Explicit flavor (`bracket`/`super`, `trigger`/`forever`).
    #[serde(alias = "order_category", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub symbol: Option<String>,
    pub exchange: Option<String>,
    #[serde(alias = "txn_type")]
    pub side: Option<String>,
    #[serde(alias = "qty")]
    pub quantity: Option<i64>,
    pub order_type: Option<String>,
    pub product: Option<String>,
    pub price: Option<Decimal>,

    // Bracket legs
    pub target_price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub trailing_jump: Option<Decimal>,

    // Trigger fields
    pub trigger_price: Option<Decimal>,
    pub order_flag: Option<String>,
    pub validity: Option<String>,
    pub disclosed_quantity: Option<i64>,
    pub price1: Option<Decimal>,
    pub trigger_price1: Option<Decimal>,
    pub quantity1: Option<i64>,

    pub tag: Option<String>,

    // Contract disambiguators
    pub strike_price: Option<Decimal>,
    pub expiry_date: Option<String>,
    pub option_type: Option<String>,
}

impl RawOrder {
    /// Whether any strike/expiry/option field carries a value.
    pub fn has_contract_fields(&self) -> bool {
        self.strike_price.is_some()
            || self.expiry_date.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.option_type.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Trimmed, uppercased symbol, if any.
    pub fn normalized_symbol(&self) -> Option<String> {
        self.symbol
            .as_deref()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Typed intents
// =============================================================================

/// Optional contract filter used to pick one derivative among many sharing a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFilter {
    pub strike: Option<Decimal>,
    pub expiry: Option<NaiveDate>,
    pub option_type: Option<OptionType>,
}

impl ContractFilter {
    pub fn is_empty(&self) -> bool {
        self.strike.is_none() && self.expiry.is_none() && self.option_type.is_none()
    }

    /// All three disambiguators present.
    pub fn is_complete(&self) -> bool {
        self.strike.is_some() && self.expiry.is_some() && self.option_type.is_some()
    }
}

/// Entry + target + stop-loss order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketOrderIntent {
    pub symbol: String,
    pub exchange: ExchangeCode,
    pub side: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    /// Present iff `order_type` is LIMIT.
    pub price: Option<Price>,
    pub product: ProductType,
    pub target_price: Price,
    pub stop_loss_price: Price,
    pub trailing_jump: Price,
    pub tag: Option<CorrelationTag>,
    pub contract: Option<ContractFilter>,
}

/// Secondary leg of an OCO trigger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcoLeg {
    pub price: Price,
    pub trigger_price: Price,
    pub quantity: u32,
}

/// Single-leg or OCO trigger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flag", rename_all = "UPPERCASE")]
pub enum TriggerFlag {
    Single,
    Oco(OcoLeg),
}

impl TriggerFlag {
    pub fn order_flag(&self) -> OrderFlag {
        match self {
            Self::Single => OrderFlag::Single,
            Self::Oco(_) => OrderFlag::Oco,
        }
    }

    pub fn oco_leg(&self) -> Option<&OcoLeg> {
        match self {
            Self::Single => None,
            Self::Oco(leg) => Some(leg),
        }
    }
}

/// Standing conditional order armed by a trigger price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOrderIntent {
    pub symbol: String,
    pub exchange: ExchangeCode,
    pub side: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    pub product: ProductType,
    pub trigger_price: Price,
    /// Present iff `order_type` is LIMIT.
    pub price: Option<Price>,
    pub flag: TriggerFlag,
    pub validity: Validity,
    /// 0, or within `[ceil(0.3 * quantity), quantity)`.
    pub disclosed_quantity: u32,
    pub tag: Option<CorrelationTag>,
    pub contract: Option<ContractFilter>,
}

/// Validated order, tagged by flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OrderIntent {
    Bracket(BracketOrderIntent),
    Trigger(TriggerOrderIntent),
}

impl OrderIntent {
    pub fn kind(&self) -> OrderKind {
        match self {
            Self::Bracket(_) => OrderKind::Bracket,
            Self::Trigger(_) => OrderKind::Trigger,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Bracket(b) => &b.symbol,
            Self::Trigger(t) => &t.symbol,
        }
    }

    pub fn exchange(&self) -> ExchangeCode {
        match self {
            Self::Bracket(b) => b.exchange,
            Self::Trigger(t) => t.exchange,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            Self::Bracket(b) => b.quantity,
            Self::Trigger(t) => t.quantity,
        }
    }

    pub fn side(&self) -> OrderSide {
        match self {
            Self::Bracket(b) => b.side,
            Self::Trigger(t) => t.side,
        }
    }

    pub fn contract(&self) -> Option<&ContractFilter> {
        match self {
            Self::Bracket(b) => b.contract.as_ref(),
            Self::Trigger(t) => t.contract.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_raw_order_accepts_aliases() {
        let raw: RawOrder = serde_json::from_str(
            r#"{"symbol":" hdfcbank ","txn_type":"buy","qty":10,"price":"1500","order_category":"SUPER"}"#,
        )
        .unwrap();
        assert_eq!(raw.side.as_deref(), Some("buy"));
        assert_eq!(raw.quantity, Some(10));
        assert_eq!(raw.price, Some(dec!(1500)));
        assert_eq!(raw.kind.as_deref(), Some("SUPER"));
        assert_eq!(raw.normalized_symbol().as_deref(), Some("HDFCBANK"));
    }

    #[test]
    fn test_has_contract_fields_ignores_blanks() {
        let mut raw = RawOrder {
            expiry_date: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!raw.has_contract_fields());
        raw.strike_price = Some(dec!(24000));
        assert!(raw.has_contract_fields());
    }

    #[test]
    fn test_contract_filter_completeness() {
        let mut filter = ContractFilter {
            strike: Some(dec!(24000)),
            ..Default::default()
        };
        assert!(!filter.is_empty());
        assert!(!filter.is_complete());
        filter.expiry = NaiveDate::from_ymd_opt(2025, 1, 30);
        filter.option_type = Some(OptionType::Put);
        assert!(filter.is_complete());
    }

    #[test]
    fn test_trigger_flag_maps_to_wire_flag() {
        let leg = OcoLeg {
            price: Price::new(dec!(90)),
            trigger_price: Price::new(dec!(91)),
            quantity: 5,
        };
        assert_eq!(TriggerFlag::Single.order_flag(), OrderFlag::Single);
        assert_eq!(TriggerFlag::Oco(leg).order_flag(), OrderFlag::Oco);
        assert_eq!(TriggerFlag::Oco(leg).oco_leg().map(|l| l.quantity), Some(5));
    }
}
