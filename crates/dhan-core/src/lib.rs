//! Core domain types for the Dhan order bridge.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`: precision-safe price newtype
//! - `OrderSide`, `OrderType`, `ProductType`, `Validity`: order enums
//! - `InstrumentDescriptor`, `ExchangeCode`, `ExchangeSegment`: instrument identity
//! - `RawOrder`, `OrderIntent`: loose inbound orders and their validated forms
//! - `PlacementResult`: broker acknowledgement

pub mod credentials;
pub mod decimal;
pub mod error;
pub mod instrument;
pub mod intent;
pub mod order;
pub mod placement;

pub use credentials::Credentials;
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use instrument::{
    parse_expiry_date, ExchangeCode, ExchangeSegment, InstrumentDescriptor, OptionType, Venue,
};
pub use intent::{
    BracketOrderIntent, ContractFilter, OcoLeg, OrderIntent, RawOrder, TriggerFlag,
    TriggerOrderIntent,
};
pub use order::{CorrelationTag, OrderFlag, OrderKind, OrderSide, OrderType, ProductType, Validity};
pub use placement::{PlacementResult, PlacementStatus};
