//! Instrument catalog for the Dhan order bridge.
//!
//! Loads the broker's instrument master (downloading it when stale) and
//! resolves trading symbols, optionally narrowed by strike, expiry and
//! option type, to the identifiers the broker expects.

pub mod catalog;
pub mod config;
pub mod error;
pub mod master;
pub mod refresher;

pub use catalog::{CatalogStats, InstrumentCatalog};
pub use config::{CatalogConfig, CatalogMode, DEFAULT_MASTER_URL};
pub use error::{CatalogError, CatalogResult};
pub use master::{MasterReader, MasterRow, RowRejection};
pub use refresher::{master_age, MasterMeta, MasterRefresher};
