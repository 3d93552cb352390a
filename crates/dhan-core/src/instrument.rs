//! Instrument identity: exchanges, wire segments and the resolved descriptor.

use crate::error::CoreError;
use crate::order::normalize_token;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Venue / ExchangeCode
// =============================================================================

/// Base trading venue, as recorded in the master file's `EXCH_ID` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Venue {
    Nse,
    Bse,
    Mcx,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
            Self::Mcx => "MCX",
        }
    }
}

impl FromStr for Venue {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "NSE" => Ok(Self::Nse),
            "BSE" => Ok(Self::Bse),
            "MCX" => Ok(Self::Mcx),
            other => Err(CoreError::InvalidExchange(other.to_string())),
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing exchange code accepted on inbound orders.
///
/// | code             | base venue | wire segment |
/// |------------------|------------|--------------|
/// | `NSE`            | NSE        | `NSE_EQ`     |
/// | `BSE`            | BSE        | `BSE_EQ`     |
/// | `NFO`, `NSE_FNO` | NSE        | `NSE_FNO`    |
/// | `BFO`, `BSE_FNO` | BSE        | `BSE_FNO`    |
/// | `MCX`            | MCX        | `MCX_COMM`   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeCode {
    Nse,
    Bse,
    Nfo,
    NseFno,
    Bfo,
    BseFno,
    Mcx,
}

impl ExchangeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
            Self::Nfo => "NFO",
            Self::NseFno => "NSE_FNO",
            Self::Bfo => "BFO",
            Self::BseFno => "BSE_FNO",
            Self::Mcx => "MCX",
        }
    }

    /// Venue an instrument must be listed on to be traded under this code.
    pub fn base_venue(&self) -> Venue {
        match self {
            Self::Nse | Self::Nfo | Self::NseFno => Venue::Nse,
            Self::Bse | Self::Bfo | Self::BseFno => Venue::Bse,
            Self::Mcx => Venue::Mcx,
        }
    }

    /// Segment this code maps to when no instrument segment is known.
    pub fn api_segment(&self) -> ExchangeSegment {
        match self {
            Self::Nse => ExchangeSegment::NseEq,
            Self::Bse => ExchangeSegment::BseEq,
            Self::Nfo | Self::NseFno => ExchangeSegment::NseFno,
            Self::Bfo | Self::BseFno => ExchangeSegment::BseFno,
            Self::Mcx => ExchangeSegment::McxComm,
        }
    }

    /// Whether the code names a futures & options segment.
    pub fn is_derivative_code(&self) -> bool {
        matches!(self, Self::Nfo | Self::NseFno | Self::Bfo | Self::BseFno)
    }
}

impl FromStr for ExchangeCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "NSE" => Ok(Self::Nse),
            "BSE" => Ok(Self::Bse),
            "NFO" => Ok(Self::Nfo),
            "NSE_FNO" => Ok(Self::NseFno),
            "BFO" => Ok(Self::Bfo),
            "BSE_FNO" => Ok(Self::BseFno),
            "MCX" => Ok(Self::Mcx),
            other => Err(CoreError::InvalidExchange(other.to_string())),
        }
    }
}

impl fmt::Display for ExchangeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ExchangeSegment
// =============================================================================

/// Wire-level exchange segment used by the broker API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeSegment {
    #[serde(rename = "NSE_EQ")]
    NseEq,
    #[serde(rename = "NSE_FNO")]
    NseFno,
    #[serde(rename = "NSE_CURRENCY")]
    NseCurrency,
    #[serde(rename = "BSE_EQ")]
    BseEq,
    #[serde(rename = "BSE_FNO")]
    BseFno,
    #[serde(rename = "BSE_CURRENCY")]
    BseCurrency,
    #[serde(rename = "MCX_COMM")]
    McxComm,
    #[serde(rename = "IDX_I")]
    IdxI,
}

impl ExchangeSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NseEq => "NSE_EQ",
            Self::NseFno => "NSE_FNO",
            Self::NseCurrency => "NSE_CURRENCY",
            Self::BseEq => "BSE_EQ",
            Self::BseFno => "BSE_FNO",
            Self::BseCurrency => "BSE_CURRENCY",
            Self::McxComm => "MCX_COMM",
            Self::IdxI => "IDX_I",
        }
    }

    /// Map the master file's (`EXCH_ID`, `SEGMENT`) pair to a wire segment.
    ///
    /// Segment letters: `E` equity, `D` derivatives, `C` currency,
    /// `M` commodity, `I` index.
    pub fn from_master(venue: Venue, segment_code: &str) -> Option<Self> {
        match (venue, normalize_token(segment_code).as_str()) {
            (_, "I") => Some(Self::IdxI),
            (Venue::Nse, "E") => Some(Self::NseEq),
            (Venue::Nse, "D") => Some(Self::NseFno),
            (Venue::Nse, "C") => Some(Self::NseCurrency),
            (Venue::Bse, "E") => Some(Self::BseEq),
            (Venue::Bse, "D") => Some(Self::BseFno),
            (Venue::Bse, "C") => Some(Self::BseCurrency),
            (Venue::Mcx, "M") | (Venue::Mcx, "D") => Some(Self::McxComm),
            _ => None,
        }
    }
}

impl FromStr for ExchangeSegment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "NSE_EQ" => Ok(Self::NseEq),
            "NSE_FNO" => Ok(Self::NseFno),
            "NSE_CURRENCY" => Ok(Self::NseCurrency),
            "BSE_EQ" => Ok(Self::BseEq),
            "BSE_FNO" => Ok(Self::BseFno),
            "BSE_CURRENCY" => Ok(Self::BseCurrency),
            "MCX_COMM" => Ok(Self::McxComm),
            "IDX_I" => Ok(Self::IdxI),
            other => Err(CoreError::UnknownEnumValue {
                field: "exchange_segment",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OptionType
// =============================================================================

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

impl FromStr for OptionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "CE" | "CALL" => Ok(Self::Call),
            "PE" | "PUT" => Ok(Self::Put),
            other => Err(CoreError::UnknownEnumValue {
                field: "option_type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// InstrumentDescriptor
// =============================================================================

/// Canonical description of one tradeable instrument.
///
/// Built once from a master-file row and never mutated; the catalog swaps
/// whole snapshots on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    /// Uppercased trading symbol (`SYMBOL_NAME`).
    pub symbol: String,
    /// Broker security id, unique within `segment`.
    pub security_id: String,
    pub venue: Venue,
    pub segment: ExchangeSegment,
    /// Always >= 1.
    pub lot_size: u32,
    pub instrument_type: String,
    pub display_name: Option<String>,
    pub isin: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub strike: Option<Decimal>,
    pub option_type: Option<OptionType>,
    /// Uppercased underlying symbol for derivatives.
    pub underlying: Option<String>,
}

impl InstrumentDescriptor {
    /// True iff the instrument has an expiry.
    #[inline]
    pub fn is_derivative(&self) -> bool {
        self.expiry.is_some()
    }

    /// Whether `key` (already uppercased) names this instrument or its underlying.
    pub fn matches_symbol(&self, key: &str) -> bool {
        self.symbol == key || self.underlying.as_deref() == Some(key)
    }

    /// Whether every present disambiguator matches this instrument.
    pub fn matches_contract(
        &self,
        strike: Option<Decimal>,
        expiry: Option<NaiveDate>,
        option_type: Option<OptionType>,
    ) -> bool {
        let strike_ok = match strike {
            Some(s) => self.strike.map(|own| own.normalize()) == Some(s.normalize()),
            None => true,
        };
        let expiry_ok = expiry.map_or(true, |e| self.expiry == Some(e));
        let option_ok = option_type.map_or(true, |o| self.option_type == Some(o));
        strike_ok && expiry_ok && option_ok
    }

    /// Normalize a raw lot size to the >= 1 invariant.
    pub fn normalized_lot(raw: Option<u32>) -> u32 {
        raw.filter(|&l| l >= 1).unwrap_or(1)
    }
}

impl fmt::Display for InstrumentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.symbol, self.segment, self.security_id)
    }
}

/// Parse an expiry date as written in the master file or by users.
///
/// Accepts `2025-01-30`, `2025-01-30 14:30:00`, `30-01-2025`, `30/01/2025`
/// and `30-Jan-2025`. Sentinels (`0`, `-1`, blank) and dates before 1900
/// yield `None`.
pub fn parse_expiry_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0" || trimmed.starts_with('-') {
        return None;
    }
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
    let date_part = date_part.split('T').next().unwrap_or(date_part);

    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%d-%b-%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .filter(|d| chrono::Datelike::year(d) >= 1900)
}
