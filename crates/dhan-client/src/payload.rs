//! Wire payloads for the placement endpoints.

use dhan_core::{
    BracketOrderIntent, ExchangeSegment, OrderFlag, OrderIntent, OrderSide, OrderType, Price,
    ProductType, TriggerOrderIntent, Validity,
};
use serde::Serialize;

/// Validated intent plus the identifiers the catalog resolved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub intent: OrderIntent,
    pub security_id: String,
    pub segment: ExchangeSegment,
}

/// Body of `POST /v2/super/orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperOrderPayload {
    pub dhan_client_id: String,
    pub security_id: String,
    pub exchange_segment: ExchangeSegment,
    pub transaction_type: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    pub product_type: ProductType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    pub target_price: Price,
    pub stop_loss_price: Price,
    pub trailing_jump: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl SuperOrderPayload {
    pub fn new(
        client_id: &str,
        intent: &BracketOrderIntent,
        security_id: &str,
        segment: ExchangeSegment,
    ) -> Self {
        Self {
            dhan_client_id: client_id.to_string(),
            security_id: security_id.to_string(),
            exchange_segment: segment,
            transaction_type: intent.side,
            quantity: intent.quantity,
            order_type: intent.order_type,
            product_type: intent.product,
            price: intent.price.filter(|_| intent.order_type.is_limit()),
            target_price: intent.target_price,
            stop_loss_price: intent.stop_loss_price,
            trailing_jump: intent.trailing_jump,
            correlation_id: intent.tag.as_ref().map(|t| t.as_str().to_string()),
        }
    }
}

/// Body of `POST /v2/forever/orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeverOrderPayload {
    pub dhan_client_id: String,
    pub order_flag: OrderFlag,
    pub transaction_type: OrderSide,
    pub exchange_segment: ExchangeSegment,
    pub product_type: ProductType,
    pub order_type: OrderType,
    pub validity: Validity,
    pub security_id: String,
    pub quantity: u32,
    pub disclosed_quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    pub trigger_price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price1: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price1: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity1: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ForeverOrderPayload {
    pub fn new(
        client_id: &str,
        intent: &TriggerOrderIntent,
        security_id: &str,
        segment: ExchangeSegment,
    ) -> Self {
        let leg = intent.flag.oco_leg();
        Self {
            dhan_client_id: client_id.to_string(),
            order_flag: intent.flag.order_flag(),
            transaction_type: intent.side,
            exchange_segment: segment,
            product_type: intent.product,
            order_type: intent.order_type,
            validity: intent.validity,
            security_id: security_id.to_string(),
            quantity: intent.quantity,
            disclosed_quantity: intent.disclosed_quantity,
            price: intent.price.filter(|_| intent.order_type.is_limit()),
            trigger_price: intent.trigger_price,
            price1: leg.map(|l| l.price),
            trigger_price1: leg.map(|l| l.trigger_price),
            quantity1: leg.map(|l| l.quantity),
            correlation_id: intent.tag.as_ref().map(|t| t.as_str().to_string()),
        }
    }
}
