//! Order-related enums and identifiers.
//!
//! Every enum serializes to the exact token the broker expects on the
//! wire (`BUY`, `LIMIT`, `INTRADAY`, ...) and parses case-insensitively
//! from user input.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trim and uppercase a user-supplied token.
pub fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(CoreError::UnknownEnumValue {
                field: "side",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
        }
    }

    #[inline]
    pub fn is_limit(&self) -> bool {
        matches!(self, Self::Limit)
    }
}

impl FromStr for OrderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "MARKET" => Ok(Self::Market),
            "LIMIT" => Ok(Self::Limit),
            other => Err(CoreError::UnknownEnumValue {
                field: "order_type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product type. Which products a flavor accepts is decided by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductType {
    Intraday,
    Cnc,
    Margin,
    Mtf,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intraday => "INTRADAY",
            Self::Cnc => "CNC",
            Self::Margin => "MARGIN",
            Self::Mtf => "MTF",
        }
    }
}

impl FromStr for ProductType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "INTRADAY" => Ok(Self::Intraday),
            "CNC" => Ok(Self::Cnc),
            "MARGIN" => Ok(Self::Margin),
            "MTF" => Ok(Self::Mtf),
            other => Err(CoreError::UnknownEnumValue {
                field: "product",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order validity for trigger orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validity {
    #[default]
    Day,
    Ioc,
}

impl Validity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::Ioc => "IOC",
        }
    }
}

impl FromStr for Validity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "DAY" => Ok(Self::Day),
            "IOC" => Ok(Self::Ioc),
            other => Err(CoreError::UnknownEnumValue {
                field: "validity",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger order flag as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderFlag {
    #[default]
    Single,
    Oco,
}

impl OrderFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Oco => "OCO",
        }
    }
}

impl FromStr for OrderFlag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "SINGLE" => Ok(Self::Single),
            "OCO" => Ok(Self::Oco),
            other => Err(CoreError::UnknownEnumValue {
                field: "order_flag",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order flavor.
///
/// Accepts the broker's product names (`SUPER`, `FOREVER`) as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Bracket,
    Trigger,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bracket => "bracket",
            Self::Trigger => "trigger",
        }
    }
}

impl FromStr for OrderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "BRACKET" | "SUPER" => Ok(Self::Bracket),
            "TRIGGER" | "FOREVER" | "GTT" => Ok(Self::Trigger),
            other => Err(CoreError::UnknownEnumValue {
                field: "order_kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied correlation tag, echoed back by the broker.
///
/// Always trimmed and non-empty; blank input yields `None` from [`CorrelationTag::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationTag(String);

impl CorrelationTag {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
