//! Tabular bulk input.
//!
//! Headers are matched loosely: case, spaces, underscores and hyphens are
//! ignored, and the usual spreadsheet aliases map onto `RawOrder` fields.

use crate::error::{BulkError, BulkResult};
use dhan_core::order::normalize_token;
use dhan_core::{OrderKind, RawOrder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Normalized header → `RawOrder` field.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("symbol", "symbol"),
    ("tradingsymbol", "symbol"),
    ("exchange", "exchange"),
    ("exch", "exchange"),
    ("transactiontype", "side"),
    ("txntype", "side"),
    ("side", "side"),
    ("quantity", "quantity"),
    ("qty", "quantity"),
    ("ordertype", "order_type"),
    ("producttype", "product"),
    ("product", "product"),
    ("price", "price"),
    ("targetprice", "target_price"),
    ("target", "target_price"),
    ("stoploss", "stop_loss_price"),
    ("stoplossprice", "stop_loss_price"),
    ("trailingjump", "trailing_jump"),
    ("trailingstoploss", "trailing_jump"),
    ("tag", "tag"),
    ("correlationid", "tag"),
    ("triggerprice", "trigger_price"),
    ("orderflag", "order_flag"),
    ("validity", "validity"),
    ("disclosedquantity", "disclosed_quantity"),
    ("price1", "price1"),
    ("triggerprice1", "trigger_price1"),
    ("quantity1", "quantity1"),
    ("strikeprice", "strike_price"),
    ("strike", "strike_price"),
    ("expirydate", "expiry_date"),
    ("expiry", "expiry_date"),
    ("optiontype", "option_type"),
    ("orderkind", "kind"),
    ("ordercategory", "kind"),
    ("kind", "kind"),
];

/// Lowercase and drop spaces, underscores and hyphens.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// `RawOrder` field for a header, if it is one we know.
pub fn canonical_field(header: &str) -> Option<&'static str> {
    let normalized = normalize_header(header);
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, field)| *field)
}

/// A cell that should hold a number but doesn't.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellError {
    pub column: String,
    pub value: String,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}' is not a valid number", self.column, self.value)
    }
}

/// One input row. Cells keep their column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkRow {
    /// Spreadsheet row number (header is row 1).
    pub row_number: usize,
    cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Cell {
    header: String,
    field: Option<&'static str>,
    value: String,
}

impl BulkRow {
    pub fn new<H, V>(row_number: usize, cells: impl IntoIterator<Item = (H, V)>) -> Self
    where
        H: Into<String>,
        V: Into<String>,
    {
        let cells = cells
            .into_iter()
            .map(|(header, value)| {
                let header: String = header.into();
                Cell {
                    field: canonical_field(&header),
                    header,
                    value: value.into(),
                }
            })
            .collect();
        Self { row_number, cells }
    }

    /// Trimmed, non-empty value of the first column mapped to `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.field == Some(field))
            .map(|c| c.value.trim())
            .filter(|v| !v.is_empty())
    }

    /// Symbol as written, for reporting.
    pub fn symbol(&self) -> Option<&str> {
        self.get("symbol")
    }

    fn header_for(&self, field: &str) -> String {
        self.cells
            .iter()
            .find(|c| c.field == Some(field))
            .map(|c| c.header.clone())
            .unwrap_or_else(|| field.to_string())
    }

    /// Build a `RawOrder`, collecting every unparseable numeric cell.
    pub fn to_raw_order(&self) -> Result<RawOrder, Vec<CellError>> {
        let mut errors = Vec::new();
        let text = |field: &str| self.get(field).map(str::to_string);

        let mut decimal = |field: &str| -> Option<Decimal> {
            let value = self.get(field)?;
            match Decimal::from_str(value).or_else(|_| Decimal::from_scientific(value)) {
                Ok(d) => Some(d),
                Err(_) => {
                    errors.push(CellError {
                        column: self.header_for(field),
                        value: value.to_string(),
                    });
                    None
                }
            }
        };

        let price = decimal("price");
        let target_price = decimal("target_price");
        let stop_loss_price = decimal("stop_loss_price");
        let trailing_jump = decimal("trailing_jump");
        let trigger_price = decimal("trigger_price");
        let price1 = decimal("price1");
        let trigger_price1 = decimal("trigger_price1");
        let strike_price = decimal("strike_price");

        // Spreadsheet exports often write integers as "10.0".
        let mut integer = |field: &str| -> Option<i64> {
            let value = self.get(field)?;
            let parsed = value.parse::<i64>().ok().or_else(|| {
                Decimal::from_str(value)
                    .ok()
                    .filter(|d| d.fract().is_zero())
                    .and_then(|d| d.to_i64())
            });
            if parsed.is_none() {
                errors.push(CellError {
                    column: self.header_for(field),
                    value: value.to_string(),
                });
            }
            parsed
        };

        let quantity = integer("quantity");
        let disclosed_quantity = integer("disclosed_quantity");
        let quantity1 = integer("quantity1");

        let raw = RawOrder {
            kind: text("kind"),
            symbol: text("symbol"),
            exchange: text("exchange"),
            side: text("side"),
            quantity,
            order_type: text("order_type"),
            product: text("product"),
            price,
            target_price,
            stop_loss_price,
            trailing_jump,
            trigger_price,
            order_flag: text("order_flag"),
            validity: text("validity"),
            disclosed_quantity,
            price1,
            trigger_price1,
            quantity1,
            tag: text("tag"),
            strike_price,
            expiry_date: text("expiry_date"),
            option_type: text("option_type"),
        };

        if errors.is_empty() {
            Ok(raw)
        } else {
            Err(errors)
        }
    }
}

/// Parse CSV input with a header line into rows.
pub fn rows_from_csv<R: Read>(reader: R) -> BulkResult<Vec<BulkRow>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv.headers()?.clone();

    let mut rows = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(BulkRow::new(
            index + 2,
            headers.iter().zip(record.iter()),
        ));
    }

    if rows.is_empty() {
        return Err(BulkError::EmptyInput);
    }
    Ok(rows)
}

/// Per-flavor required fields, checked before the validator so the row
/// gets a message naming the spreadsheet columns.
///
/// # Returns
/// The flavor the row will be placed as.
pub fn gate_row(raw: &RawOrder) -> Result<OrderKind, String> {
    if raw.symbol.as_deref().map_or(true, |s| s.trim().is_empty()) {
        return Err("Symbol is required".to_string());
    }

    let kind = dhan_validator::resolve_kind(raw).map_err(|e| e.to_string())?;
    match kind {
        OrderKind::Bracket => {
            let missing = missing_columns(&[
                ("TargetPrice", raw.target_price.is_some()),
                ("StopLoss", raw.stop_loss_price.is_some()),
            ]);
            if !missing.is_empty() {
                return Err(format!("Bracket orders require {}", missing.join(" and ")));
            }
        }
        OrderKind::Trigger => {
            if raw.trigger_price.is_none() {
                return Err("Trigger orders require TriggerPrice".to_string());
            }
            let is_oco = raw
                .order_flag
                .as_deref()
                .is_some_and(|flag| normalize_token(flag) == "OCO");
            if is_oco {
                let missing = missing_columns(&[
                    ("Price1", raw.price1.is_some()),
                    ("TriggerPrice1", raw.trigger_price1.is_some()),
                    ("Quantity1", raw.quantity1.is_some()),
                ]);
                if !missing.is_empty() {
                    return Err(format!("OCO trigger orders require {}", missing.join(", ")));
                }
            }
        }
    }
    Ok(kind)
}

fn missing_columns<'a>(checks: &[(&'a str, bool)]) -> Vec<&'a str> {
    checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}
