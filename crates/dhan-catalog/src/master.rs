//! Instrument master file parsing.
//!
//! The master is the broker's detailed scrip-master CSV. Only the columns
//! below are read; any others are ignored.

use crate::error::CatalogResult;
use dhan_core::{parse_expiry_date, ExchangeSegment, InstrumentDescriptor, OptionType, Venue};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One master-file row, all cells as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MasterRow {
    #[serde(rename = "EXCH_ID")]
    pub exch_id: String,
    #[serde(rename = "SEGMENT")]
    pub segment: String,
    #[serde(rename = "SECURITY_ID")]
    pub security_id: String,
    #[serde(rename = "ISIN")]
    pub isin: String,
    #[serde(rename = "INSTRUMENT")]
    pub instrument: String,
    #[serde(rename = "UNDERLYING_SECURITY_ID")]
    pub underlying_security_id: String,
    #[serde(rename = "UNDERLYING_SYMBOL")]
    pub underlying_symbol: String,
    #[serde(rename = "SYMBOL_NAME")]
    pub symbol_name: String,
    #[serde(rename = "DISPLAY_NAME")]
    pub display_name: String,
    #[serde(rename = "INSTRUMENT_TYPE")]
    pub instrument_type: String,
    #[serde(rename = "SERIES")]
    pub series: String,
    #[serde(rename = "LOT_SIZE")]
    pub lot_size: String,
    #[serde(rename = "SM_EXPIRY_DATE")]
    pub expiry_date: String,
    #[serde(rename = "STRIKE_PRICE")]
    pub strike_price: String,
    #[serde(rename = "OPTION_TYPE")]
    pub option_type: String,
}

/// Why a row could not become a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    MissingSymbol,
    MissingSecurityId,
    UnknownVenue,
    UnknownSegment,
}

impl MasterRow {
    /// Uppercased key the row is indexed under.
    pub fn symbol_key(&self) -> String {
        self.symbol_name.trim().to_ascii_uppercase()
    }

    /// Uppercased underlying symbol, if the row has a meaningful one.
    pub fn underlying_key(&self) -> Option<String> {
        non_blank(&self.underlying_symbol)
            .map(|s| s.to_ascii_uppercase())
            .filter(|s| s != "NA")
    }

    /// Normalize the row into a descriptor.
    ///
    /// Lot sizes below 1 become 1. Expiry sentinels, non-positive strikes and
    /// option type `XX` are treated as absent.
    pub fn to_descriptor(&self) -> Result<InstrumentDescriptor, RowRejection> {
        let symbol = self.symbol_key();
        if symbol.is_empty() {
            return Err(RowRejection::MissingSymbol);
        }
        let security_id = self.security_id.trim().to_string();
        if security_id.is_empty() {
            return Err(RowRejection::MissingSecurityId);
        }
        let venue: Venue = self
            .exch_id
            .parse()
            .map_err(|_| RowRejection::UnknownVenue)?;
        let segment =
            ExchangeSegment::from_master(venue, &self.segment).ok_or(RowRejection::UnknownSegment)?;

        let lot_size = parse_decimal(&self.lot_size).and_then(|d| d.trunc().to_u32());
        let strike = parse_decimal(&self.strike_price).filter(|d| *d > Decimal::ZERO);
        let option_type = non_blank(&self.option_type).and_then(|s| s.parse::<OptionType>().ok());

        Ok(InstrumentDescriptor {
            symbol,
            security_id,
            venue,
            segment,
            lot_size: InstrumentDescriptor::normalized_lot(lot_size),
            instrument_type: self.instrument_type.trim().to_ascii_uppercase(),
            display_name: non_blank(&self.display_name).map(str::to_string),
            isin: non_blank(&self.isin).map(str::to_string),
            expiry: parse_expiry_date(&self.expiry_date),
            strike: strike.map(|d| d.normalize()),
            option_type,
            underlying: self.underlying_key(),
        })
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    non_blank(s).and_then(|t| t.parse::<Decimal>().ok())
}

// =============================================================================
// Reader
// =============================================================================

/// Sequential reader over master rows.
pub struct MasterReader<R: Read> {
    inner: csv::Reader<R>,
}

impl MasterReader<BufReader<File>> {
    /// Open a master file from disk.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read> MasterReader<R> {
    pub fn from_reader(reader: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self { inner }
    }

    /// Iterate rows. Malformed records surface as errors; callers decide whether to skip.
    pub fn rows(&mut self) -> impl Iterator<Item = csv::Result<MasterRow>> + '_ {
        self.inner.deserialize::<MasterRow>()
    }

    /// Visit rows in chunks of `chunk_rows`, stopping early when `visit` returns `false`.
    ///
    /// Returns the number of rows read. Only one chunk is held in memory at a time.
    pub fn for_each_chunk<F>(&mut self, chunk_rows: usize, mut visit: F) -> CatalogResult<usize>
    where
        F: FnMut(&[MasterRow]) -> bool,
    {
        let chunk_rows = chunk_rows.max(1);
        let mut chunk = Vec::with_capacity(chunk_rows);
        let mut total = 0usize;

        for row in self.inner.deserialize::<MasterRow>() {
            match row {
                Ok(row) => chunk.push(row),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed master record");
                    continue;
                }
            }
            if chunk.len() == chunk_rows {
                total += chunk.len();
                if !visit(&chunk) {
                    return Ok(total);
                }
                chunk.clear();
            }
        }

        if !chunk.is_empty() {
            total += chunk.len();
            visit(&chunk);
        }
        Ok(total)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Small master covering equities, an index future and two index options.
    pub const MASTER_CSV: &str = "\
EXCH_ID,SEGMENT,SECURITY_ID,ISIN,INSTRUMENT,UNDERLYING_SECURITY_ID,UNDERLYING_SYMBOL,SYMBOL_NAME,DISPLAY_NAME,INSTRUMENT_TYPE,SERIES,LOT_SIZE,SM_EXPIRY_DATE,STRIKE_PRICE,OPTION_TYPE
NSE,E,1333,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,EQ,1.0,0,-0.01000,XX
BSE,E,500180,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,A,1.0,0,-0.01000,XX
NSE,E,1594,INE009A01021,EQUITY,,INFY,INFY,Infosys,ES,EQ,1.0,0,-0.01000,XX
NSE,D,35001,,FUTIDX,26000,NIFTY,NIFTY-Jan2025-FUT,NIFTY JAN FUT,FUTIDX,NA,50.0,2025-01-30 14:30:00,-0.01000,XX
NSE,D,49081,,OPTIDX,26000,NIFTY,NIFTY-Jan2025-24000-CE,NIFTY 30 JAN 24000 CALL,OPTIDX,NA,75.0,2025-01-30 14:30:00,24000.00000,CE
NSE,D,49082,,OPTIDX,26000,NIFTY,NIFTY-Jan2025-24000-PE,NIFTY 30 JAN 24000 PUT,OPTIDX,NA,75.0,2025-01-30 14:30:00,24000.00000,PE
BSE,D,1130,,OPTIDX,1,SENSEX,BSXOPT,SENSEX 30 JAN 80000 CALL,OPTIDX,NA,20.0,2025-01-30 14:30:00,80000.00000,CE
BSE,D,1131,,OPTIDX,1,SENSEX,BSXOPT,SENSEX 30 JAN 80100 CALL,OPTIDX,NA,20.0,2025-01-30 14:30:00,80100.00000,CE
NSE,E,1333,INE040A01034,EQUITY,,HDFCBANK,HDFCDUP,Duplicate,ES,EQ,1.0,0,-0.01000,XX
NSE,Z,9999,,WEIRD,,,ODDITY,Odd,XX,NA,1.0,0,0,XX
";
}
