//! Field checks shared by both intent flavors.

use crate::error::{ValidationError, ValidationResult};
use dhan_core::{
    parse_expiry_date, ContractFilter, CorrelationTag, ExchangeCode, OptionType, OrderSide,
    OrderType, Price, RawOrder,
};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Fields every intent carries.
pub(crate) struct CommonFields {
    pub symbol: String,
    pub exchange: ExchangeCode,
    pub side: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub tag: Option<CorrelationTag>,
    pub contract: Option<ContractFilter>,
}

pub(crate) fn common_fields(raw: &RawOrder) -> ValidationResult<CommonFields> {
    let symbol = raw
        .normalized_symbol()
        .ok_or(ValidationError::Missing { field: "symbol" })?;
    let exchange = parse_enum::<ExchangeCode>("exchange", raw.exchange.as_deref())?;
    let side = parse_enum::<OrderSide>("side", raw.side.as_deref())
        .map_err(|_| ValidationError::invalid("side", "must be BUY or SELL"))?;
    let quantity = positive_quantity("quantity", raw.quantity)?;
    let order_type = parse_enum::<OrderType>("order_type", raw.order_type.as_deref())
        .map_err(|_| ValidationError::invalid("order_type", "must be MARKET or LIMIT"))?;
    let price = entry_price(order_type, raw.price)?;
    let tag = raw.tag.as_deref().and_then(CorrelationTag::parse);
    let contract = contract_filter(raw)?;

    Ok(CommonFields {
        symbol,
        exchange,
        side,
        quantity,
        order_type,
        price,
        tag,
        contract,
    })
}

/// Parse a required enum field after trimming; blank counts as missing.
pub(crate) fn parse_enum<T: FromStr>(
    field: &'static str,
    raw: Option<&str>,
) -> ValidationResult<T> {
    let value = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::Missing { field })?;
    value
        .parse::<T>()
        .map_err(|_| ValidationError::invalid(field, format!("unsupported value '{value}'")))
}

/// Optional enum field: blank or absent yields `default`.
pub(crate) fn parse_enum_or<T: FromStr>(
    field: &'static str,
    raw: Option<&str>,
    default: T,
) -> ValidationResult<T> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ValidationError::invalid(field, format!("unsupported value '{value}'"))),
    }
}

pub(crate) fn positive_quantity(field: &'static str, raw: Option<i64>) -> ValidationResult<u32> {
    let value = raw.ok_or(ValidationError::Missing { field })?;
    if value <= 0 {
        return Err(ValidationError::invalid(field, "must be > 0"));
    }
    u32::try_from(value).map_err(|_| ValidationError::invalid(field, "is too large"))
}

pub(crate) fn positive_price(field: &'static str, raw: Option<Decimal>) -> ValidationResult<Price> {
    let value = Price::new(raw.ok_or(ValidationError::Missing { field })?);
    if !value.is_positive() {
        return Err(ValidationError::invalid(field, "must be > 0"));
    }
    Ok(value)
}

/// Price is required for LIMIT and must be absent for MARKET.
pub(crate) fn entry_price(
    order_type: OrderType,
    raw: Option<Decimal>,
) -> ValidationResult<Option<Price>> {
    match (order_type, raw) {
        (OrderType::Limit, None) => Err(ValidationError::invalid(
            "price",
            "is required when order_type is LIMIT",
        )),
        (OrderType::Market, Some(_)) => Err(ValidationError::invalid(
            "price",
            "must be empty when order_type is MARKET",
        )),
        (OrderType::Limit, Some(_)) => positive_price("price", raw).map(Some),
        (OrderType::Market, None) => Ok(None),
    }
}

fn contract_filter(raw: &RawOrder) -> ValidationResult<Option<ContractFilter>> {
    let strike = match raw.strike_price {
        Some(s) if s <= Decimal::ZERO => {
            return Err(ValidationError::invalid("strike_price", "must be > 0"))
        }
        other => other,
    };

    let expiry = match raw.expiry_date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(parse_expiry_date(text).ok_or_else(|| {
            ValidationError::invalid("expiry_date", format!("unrecognized date '{text}'"))
        })?),
    };

    let option_type = match raw.option_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(
            text.parse::<OptionType>()
                .map_err(|_| ValidationError::invalid("option_type", "must be CE or PE"))?,
        ),
    };

    let filter = ContractFilter {
        strike,
        expiry,
        option_type,
    };
    Ok((!filter.is_empty()).then_some(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entry_price_rules() {
        assert!(entry_price(OrderType::Limit, None).is_err());
        assert!(entry_price(OrderType::Market, Some(dec!(10))).is_err());
        assert!(entry_price(OrderType::Limit, Some(dec!(0))).is_err());
        assert_eq!(entry_price(OrderType::Market, None).unwrap(), None);
        assert_eq!(
            entry_price(OrderType::Limit, Some(dec!(10))).unwrap(),
            Some(Price::new(dec!(10)))
        );
    }

    #[test]
    fn test_positive_quantity() {
        assert_eq!(positive_quantity("quantity", Some(5)).unwrap(), 5);
        assert_eq!(
            positive_quantity("quantity", None).unwrap_err(),
            ValidationError::Missing { field: "quantity" }
        );
        assert!(positive_quantity("quantity", Some(0)).is_err());
        assert!(positive_quantity("quantity", Some(i64::MAX)).is_err());
    }

    #[test]
    fn test_contract_filter_parsing() {
        let raw = RawOrder {
            strike_price: Some(dec!(24000)),
            expiry_date: Some("30-01-2025".to_string()),
            option_type: Some("ce".to_string()),
            ..Default::default()
        };
        let filter = contract_filter(&raw).unwrap().unwrap();
        assert!(filter.is_complete());
        assert_eq!(filter.option_type, Some(OptionType::Call));

        let bad = RawOrder {
            expiry_date: Some("someday".to_string()),
            ..Default::default()
        };
        assert_eq!(contract_filter(&bad).unwrap_err().field(), "expiry_date");
        assert_eq!(contract_filter(&RawOrder::default()).unwrap(), None);
    }
}
