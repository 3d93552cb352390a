//! Shared fixtures for orchestrator integration tests.

use dhan_catalog::{CatalogConfig, InstrumentCatalog};
use dhan_client::{MockGateway, RateLimiter};
use dhan_core::RawOrder;
use dhan_orchestrator::OrderOrchestrator;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

pub const MASTER_CSV: &str = "\
EXCH_ID,SEGMENT,SECURITY_ID,ISIN,INSTRUMENT,UNDERLYING_SECURITY_ID,UNDERLYING_SYMBOL,SYMBOL_NAME,DISPLAY_NAME,INSTRUMENT_TYPE,SERIES,LOT_SIZE,SM_EXPIRY_DATE,STRIKE_PRICE,OPTION_TYPE
NSE,E,1333,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,EQ,1.0,0,-0.01000,XX
NSE,E,1594,INE009A01021,EQUITY,,INFY,INFY,Infosys,ES,EQ,1.0,0,-0.01000,XX
BSE,E,500180,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,A,1.0,0,-0.01000,XX
NSE,D,35001,,FUTIDX,26000,NIFTY,NIFTY-Jan2025-FUT,NIFTY JAN FUT,FUTIDX,NA,50.0,2025-01-30 14:30:00,-0.01000,XX
NSE,D,49081,,OPTIDX,26000,NIFTY,NIFTY-Jan2025-24000-CE,NIFTY 30 JAN 24000 CALL,OPTIDX,NA,75.0,2025-01-30 14:30:00,24000.00000,CE
";

pub struct Harness {
    pub _dir: TempDir,
    pub gateway: Arc<MockGateway>,
    pub orchestrator: OrderOrchestrator,
}

pub fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let master_path = dir.path().join("dhan_instruments.csv");
    std::fs::write(&master_path, MASTER_CSV).unwrap();

    let catalog = InstrumentCatalog::new(CatalogConfig {
        master_path,
        auto_refresh: false,
        ..Default::default()
    });
    let gateway = Arc::new(MockGateway::new());
    let orchestrator = OrderOrchestrator::new(
        catalog,
        gateway.clone(),
        Arc::new(RateLimiter::per_second(25)),
    );
    Harness {
        _dir: dir,
        gateway,
        orchestrator,
    }
}

/// BUY LIMIT 10 HDFCBANK @1500, target 1600, stop-loss 1400.
pub fn hdfc_bracket() -> RawOrder {
    RawOrder {
        symbol: Some("HDFCBANK".to_string()),
        exchange: Some("NSE".to_string()),
        side: Some("BUY".to_string()),
        quantity: Some(10),
        order_type: Some("LIMIT".to_string()),
        product: Some("INTRADAY".to_string()),
        price: Some(dec!(1500)),
        target_price: Some(dec!(1600)),
        stop_loss_price: Some(dec!(1400)),
        ..Default::default()
    }
}
