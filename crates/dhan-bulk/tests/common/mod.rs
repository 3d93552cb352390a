//! Shared fixtures for bulk processor tests.

use dhan_bulk::{BulkProcessor, BulkRow};
use dhan_catalog::{CatalogConfig, InstrumentCatalog};
use dhan_client::{MockGatewayFactory, RateLimiter};
use dhan_core::Credentials;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const MASTER_CSV: &str = "\
EXCH_ID,SEGMENT,SECURITY_ID,ISIN,INSTRUMENT,UNDERLYING_SECURITY_ID,UNDERLYING_SYMBOL,SYMBOL_NAME,DISPLAY_NAME,INSTRUMENT_TYPE,SERIES,LOT_SIZE,SM_EXPIRY_DATE,STRIKE_PRICE,OPTION_TYPE
NSE,E,1333,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,EQ,1.0,0,-0.01000,XX
NSE,E,1594,INE009A01021,EQUITY,,INFY,INFY,Infosys,ES,EQ,1.0,0,-0.01000,XX
NSE,D,35001,,FUTIDX,26000,NIFTY,NIFTY-Jan2025-FUT,NIFTY JAN FUT,FUTIDX,NA,50.0,2025-01-30 14:30:00,-0.01000,XX
";

pub struct Harness {
    pub _dir: TempDir,
    pub factory: Arc<MockGatewayFactory>,
    pub processor: BulkProcessor,
}

pub fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let master_path = dir.path().join("dhan_instruments.csv");
    std::fs::write(&master_path, MASTER_CSV).unwrap();
    harness_with_master(dir, master_path)
}

/// Harness whose catalog points at `master_path`, which may not exist.
///
/// An existing master is loaded up front so paused-time tests never wait
/// on file IO.
pub fn harness_with_master(dir: TempDir, master_path: PathBuf) -> Harness {
    let preload = master_path.exists();
    let catalog = InstrumentCatalog::new(CatalogConfig {
        master_path,
        auto_refresh: false,
        ..Default::default()
    });
    if preload {
        catalog.load_blocking().unwrap();
    }
    let factory = Arc::new(MockGatewayFactory::new());
    let processor = BulkProcessor::new(
        catalog,
        factory.clone(),
        Arc::new(RateLimiter::per_second(25)),
    );
    Harness {
        _dir: dir,
        factory,
        processor,
    }
}

pub fn creds() -> Credentials {
    Credentials::new("1000001", "token")
}

/// BUY LIMIT bracket for `symbol` on NSE.
pub fn bracket_row(row_number: usize, symbol: &str) -> BulkRow {
    BulkRow::new(
        row_number,
        [
            ("Symbol", symbol),
            ("Exchange", "NSE"),
            ("TransactionType", "BUY"),
            ("Quantity", "10"),
            ("OrderType", "LIMIT"),
            ("ProductType", "INTRADAY"),
            ("Price", "1500"),
            ("TargetPrice", "1550"),
            ("StopLoss", "1480"),
        ],
    )
}
