//! Remote placement client for the Dhan REST API.
//!
//! - `BrokerClient`: super/forever order placement and batched LTP quotes
//! - `PlacementGateway` / `QuoteSource` / `GatewayFactory`: trait seams with mocks
//! - `RateLimiter`: process-wide sliding-window call ceiling

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod payload;
pub mod rate_limiter;

pub use client::{classify_placement, BrokerClient, LastPrices};
pub use config::{ClientConfig, RateLimitConfig, DEFAULT_API_BASE_URL};
pub use error::{ClientResult, PlacementError};
pub use gateway::{
    BoxFuture, DynGateway, DynGatewayFactory, DynQuoteSource, GatewayFactory, HttpGatewayFactory,
    MockGateway, MockGatewayFactory, MockQuoteSource, PlacementGateway, QuoteSource,
};
pub use payload::{ForeverOrderPayload, PlacementRequest, SuperOrderPayload};
pub use rate_limiter::RateLimiter;
