//! Order orchestration: validate, resolve, check, throttle, place.
//!
//! Local failures (validation, unknown instrument, exchange mismatch,
//! lot size) are detected before any network call; remote failures are
//! classified by the placement client and carried through unchanged.

pub mod error;
pub mod orchestrator;

pub use error::{OrderError, OrderResult};
pub use orchestrator::{check_exchange, check_lot_size, OrderOrchestrator, PreparedOrder};
