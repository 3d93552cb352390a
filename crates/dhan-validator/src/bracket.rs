//! Bracket (entry + target + stop-loss) intent validation.

use crate::common::{common_fields, parse_enum, positive_price};
use crate::error::{ValidationError, ValidationResult};
use dhan_core::{BracketOrderIntent, OrderKind, OrderSide, OrderType, Price, ProductType, RawOrder};
use rust_decimal::Decimal;

const BRACKET_PRODUCTS: [ProductType; 4] = [
    ProductType::Intraday,
    ProductType::Cnc,
    ProductType::Margin,
    ProductType::Mtf,
];

/// Validate a raw order as a bracket intent.
///
/// # Errors
/// Returns the first failing field. LIMIT orders must satisfy
/// `stop_loss < price < target` for BUY and `target < price < stop_loss`
/// for SELL; MARKET orders only require `target != stop_loss`.
pub fn validate_bracket(raw: &RawOrder) -> ValidationResult<BracketOrderIntent> {
    if let Some(kind) = raw.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        if kind.parse::<OrderKind>().ok() != Some(OrderKind::Bracket) {
            return Err(ValidationError::invalid(
                "kind",
                format!("'{}' is not a bracket order", kind.trim()),
            ));
        }
    }

    let common = common_fields(raw)?;

    let product = parse_enum::<ProductType>("product", raw.product.as_deref())?;
    if !BRACKET_PRODUCTS.contains(&product) {
        return Err(ValidationError::invalid(
            "product",
            "allowed: INTRADAY, CNC, MARGIN, MTF",
        ));
    }

    let target_price = positive_price("target_price", raw.target_price)?;
    let stop_loss_price = positive_price("stop_loss_price", raw.stop_loss_price)?;

    let trailing_jump = Price::new(raw.trailing_jump.unwrap_or(Decimal::ZERO));
    if trailing_jump.inner() < Decimal::ZERO {
        return Err(ValidationError::invalid("trailing_jump", "must be >= 0"));
    }

    check_price_relationships(
        common.order_type,
        common.side,
        common.price,
        target_price,
        stop_loss_price,
    )?;

    Ok(BracketOrderIntent {
        symbol: common.symbol,
        exchange: common.exchange,
        side: common.side,
        quantity: common.quantity,
        order_type: common.order_type,
        price: common.price,
        product,
        target_price,
        stop_loss_price,
        trailing_jump,
        tag: common.tag,
        contract: common.contract,
    })
}

fn check_price_relationships(
    order_type: OrderType,
    side: OrderSide,
    price: Option<Price>,
    target: Price,
    stop_loss: Price,
) -> ValidationResult<()> {
    match (order_type, price) {
        // Execution price unknown; only a degenerate bracket can be rejected.
        (OrderType::Market, _) => {
            if target == stop_loss {
                return Err(ValidationError::invalid(
                    "stop_loss_price",
                    "target_price and stop_loss_price cannot be equal",
                ));
            }
        }
        (OrderType::Limit, Some(entry)) => {
            let ordered = match side {
                OrderSide::Buy => stop_loss < entry && entry < target,
                OrderSide::Sell => target < entry && entry < stop_loss,
            };
            if !ordered {
                let rule = match side {
                    OrderSide::Buy => "for BUY (LIMIT): stop_loss_price < price < target_price",
                    OrderSide::Sell => "for SELL (LIMIT): target_price < price < stop_loss_price",
                };
                return Err(ValidationError::invalid("stop_loss_price", rule));
            }
        }
        (OrderType::Limit, None) => {
            return Err(ValidationError::invalid(
                "price",
                "is required when order_type is LIMIT",
            ))
        }
    }
    Ok(())
}
