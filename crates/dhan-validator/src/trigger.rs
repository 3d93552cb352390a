//! Trigger (standing conditional) intent validation.

use crate::common::{common_fields, parse_enum, parse_enum_or, positive_price};
use crate::error::{ValidationError, ValidationResult};
use dhan_core::{
    OcoLeg, OrderFlag, OrderKind, ProductType, RawOrder, TriggerFlag, TriggerOrderIntent, Validity,
};

const TRIGGER_PRODUCTS: [ProductType; 2] = [ProductType::Cnc, ProductType::Mtf];

/// Smallest nonzero disclosed quantity allowed for `quantity`: `ceil(0.3 * quantity)`.
pub fn min_disclosed_quantity(quantity: u32) -> u32 {
    let q = u64::from(quantity);
    ((3 * q + 9) / 10) as u32
}

/// Validate a raw order as a trigger intent.
///
/// OCO orders must carry `price1`, `trigger_price1` and `quantity1`, all
/// positive. SINGLE orders drop those fields.
pub fn validate_trigger(raw: &RawOrder) -> ValidationResult<TriggerOrderIntent> {
    if let Some(kind) = raw.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        if kind.parse::<OrderKind>().ok() != Some(OrderKind::Trigger) {
            return Err(ValidationError::invalid(
                "kind",
                format!("'{}' is not a trigger order", kind.trim()),
            ));
        }
    }

    let common = common_fields(raw)?;

    let product = parse_enum::<ProductType>("product", raw.product.as_deref())?;
    if !TRIGGER_PRODUCTS.contains(&product) {
        return Err(ValidationError::invalid("product", "allowed: CNC, MTF"));
    }

    let trigger_price = positive_price("trigger_price", raw.trigger_price)?;
    let flag = parse_enum_or("order_flag", raw.order_flag.as_deref(), OrderFlag::Single)?;
    let validity = parse_enum_or("validity", raw.validity.as_deref(), Validity::Day)?;
    let disclosed_quantity = disclosed_quantity(raw.disclosed_quantity, common.quantity)?;

    let flag = match flag {
        OrderFlag::Single => TriggerFlag::Single,
        OrderFlag::Oco => TriggerFlag::Oco(oco_leg(raw)?),
    };

    Ok(TriggerOrderIntent {
        symbol: common.symbol,
        exchange: common.exchange,
        side: common.side,
        quantity: common.quantity,
        order_type: common.order_type,
        product,
        trigger_price,
        price: common.price,
        flag,
        validity,
        disclosed_quantity,
        tag: common.tag,
        contract: common.contract,
    })
}

fn disclosed_quantity(raw: Option<i64>, quantity: u32) -> ValidationResult<u32> {
    let value = raw.unwrap_or(0);
    if value < 0 {
        return Err(ValidationError::invalid("disclosed_quantity", "must be >= 0"));
    }
    if value == 0 {
        return Ok(0);
    }
    if value >= i64::from(quantity) {
        return Err(ValidationError::invalid(
            "disclosed_quantity",
            "must be less than quantity",
        ));
    }
    let min = min_disclosed_quantity(quantity);
    if value < i64::from(min) {
        return Err(ValidationError::invalid(
            "disclosed_quantity",
            format!("must be >= {min} (30% of quantity)"),
        ));
    }
    Ok(value as u32)
}

fn oco_leg(raw: &RawOrder) -> ValidationResult<OcoLeg> {
    let mut missing = Vec::new();
    if raw.price1.is_none() {
        missing.push("price1");
    }
    if raw.trigger_price1.is_none() {
        missing.push("trigger_price1");
    }
    if raw.quantity1.is_none() {
        missing.push("quantity1");
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingOcoFields(missing));
    }

    let price = positive_price("price1", raw.price1)?;
    let trigger_price = positive_price("trigger_price1", raw.trigger_price1)?;
    let quantity = match raw.quantity1 {
        Some(q) if q > 0 => {
            u32::try_from(q).map_err(|_| ValidationError::invalid("quantity1", "is too large"))?
        }
        _ => return Err(ValidationError::invalid("quantity1", "must be > 0")),
    };

    Ok(OcoLeg {
        price,
        trigger_price,
        quantity,
    })
}
