//! Order intent validation.
//!
//! Pure functions that turn a loosely-typed `RawOrder` into a typed
//! `OrderIntent`:
//! - `validate_bracket`: entry + target + stop-loss orders
//! - `validate_trigger`: single-leg and OCO trigger orders
//! - `validate`: picks the flavor, then delegates
//! - `validate_batch`: validates every row, collecting all failures
//!
//! Nothing here knows about instruments; lot-size rules live in the
//! orchestrator, which has the resolved instrument.

pub mod batch;
pub mod bracket;
mod common;
pub mod error;
pub mod trigger;

pub use batch::{resolve_kind, validate, validate_batch, BatchValidation};
pub use bracket::validate_bracket;
pub use error::{ValidationError, ValidationResult};
pub use trigger::{min_disclosed_quantity, validate_trigger};
