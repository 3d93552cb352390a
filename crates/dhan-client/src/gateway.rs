//! Trait seams over the broker client.
//!
//! The orchestrator and deferred queue depend on these traits rather than
//! on `BrokerClient` directly, so tests can inject recorded mocks:
//! - `PlacementGateway`: places one resolved order
//! - `QuoteSource`: batched last-traded prices per segment
//! - `GatewayFactory`: builds a fresh gateway/quote source per worker

use crate::client::{BrokerClient, LastPrices};
use crate::config::ClientConfig;
use crate::error::{ClientResult, PlacementError};
use crate::payload::PlacementRequest;
use dhan_core::{
    Credentials, ExchangeSegment, OrderIntent, PlacementResult, PlacementStatus, Price,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Places a resolved order with the broker.
pub trait PlacementGateway: Send + Sync {
    fn place(&self, request: PlacementRequest) -> BoxFuture<'_, ClientResult<PlacementResult>>;
}

/// Batched last-traded-price lookups.
pub trait QuoteSource: Send + Sync {
    /// Prices for `security_ids`, all on `segment`, in one remote call.
    fn last_prices(
        &self,
        segment: ExchangeSegment,
        security_ids: Vec<String>,
    ) -> BoxFuture<'_, ClientResult<LastPrices>>;
}

/// Builds per-worker clients from credentials.
pub trait GatewayFactory: Send + Sync {
    fn gateway(&self, credentials: &Credentials) -> ClientResult<DynGateway>;

    fn quote_source(&self, credentials: &Credentials) -> ClientResult<DynQuoteSource>;
}

pub type DynGateway = Arc<dyn PlacementGateway>;
pub type DynQuoteSource = Arc<dyn QuoteSource>;
pub type DynGatewayFactory = Arc<dyn GatewayFactory>;

impl PlacementGateway for BrokerClient {
    fn place(&self, request: PlacementRequest) -> BoxFuture<'_, ClientResult<PlacementResult>> {
        Box::pin(async move {
            match &request.intent {
                OrderIntent::Bracket(intent) => {
                    self.place_bracket(intent, &request.security_id, request.segment)
                        .await
                }
                OrderIntent::Trigger(intent) => {
                    self.place_trigger(intent, &request.security_id, request.segment)
                        .await
                }
            }
        })
    }
}

impl QuoteSource for BrokerClient {
    fn last_prices(
        &self,
        segment: ExchangeSegment,
        security_ids: Vec<String>,
    ) -> BoxFuture<'_, ClientResult<LastPrices>> {
        Box::pin(async move { self.fetch_ltp(segment, &security_ids).await })
    }
}

/// Factory producing real HTTP clients, one per call.
#[derive(Debug, Clone, Default)]
pub struct HttpGatewayFactory {
    config: ClientConfig,
}

impl HttpGatewayFactory {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl GatewayFactory for HttpGatewayFactory {
    fn gateway(&self, credentials: &Credentials) -> ClientResult<DynGateway> {
        Ok(Arc::new(BrokerClient::new(&self.config, credentials.clone())?))
    }

    fn quote_source(&self, credentials: &Credentials) -> ClientResult<DynQuoteSource> {
        Ok(Arc::new(BrokerClient::new(&self.config, credentials.clone())?))
    }
}

// =============================================================================
// Mocks
// =============================================================================

/// Recording gateway for tests.
///
/// Returns queued results first, then a generated acceptance.
#[derive(Debug, Default)]
pub struct MockGateway {
    calls: Mutex<Vec<PlacementRequest>>,
    queued: Mutex<VecDeque<ClientResult<PlacementResult>>>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next unanswered call.
    pub fn push_result(&self, result: ClientResult<PlacementResult>) {
        self.queued.lock().push_back(result);
    }

    /// Sleep this long inside every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<PlacementRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn accepted(&self) -> PlacementResult {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("MOCK-{n}");
        PlacementResult {
            raw: serde_json::json!({"orderId": order_id, "orderStatus": "TRANSIT"}),
            order_id,
            status: PlacementStatus::Transit,
            error_code: None,
        }
    }
}

impl PlacementGateway for MockGateway {
    fn place(&self, request: PlacementRequest) -> BoxFuture<'_, ClientResult<PlacementResult>> {
        Box::pin(async move {
            self.calls.lock().push(request);
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let queued = self.queued.lock().pop_front();
            queued.unwrap_or_else(|| Ok(self.accepted()))
        })
    }
}

/// Quote source with fixed prices per segment.
#[derive(Debug, Default)]
pub struct MockQuoteSource {
    prices: Mutex<HashMap<ExchangeSegment, LastPrices>>,
    failing: Mutex<HashSet<ExchangeSegment>>,
    calls: Mutex<Vec<(ExchangeSegment, Vec<String>)>>,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, segment: ExchangeSegment, security_id: &str, price: Price) {
        self.prices
            .lock()
            .entry(segment)
            .or_default()
            .insert(security_id.to_string(), price);
    }

    /// Make every request for `segment` fail with a transport error.
    pub fn fail_segment(&self, segment: ExchangeSegment) {
        self.failing.lock().insert(segment);
    }

    pub fn calls(&self) -> Vec<(ExchangeSegment, Vec<String>)> {
        self.calls.lock().clone()
    }
}

impl QuoteSource for MockQuoteSource {
    fn last_prices(
        &self,
        segment: ExchangeSegment,
        security_ids: Vec<String>,
    ) -> BoxFuture<'_, ClientResult<LastPrices>> {
        Box::pin(async move {
            self.calls.lock().push((segment, security_ids.clone()));
            if self.failing.lock().contains(&segment) {
                return Err(PlacementError::Transport(format!(
                    "quote feed unavailable for {segment}"
                )));
            }
            let prices = self.prices.lock();
            let known = prices.get(&segment);
            Ok(security_ids
                .into_iter()
                .filter_map(|id| known.and_then(|p| p.get(&id)).map(|price| (id, *price)))
                .collect())
        })
    }
}

/// Factory handing out shared mocks and recording who asked.
#[derive(Debug, Default)]
pub struct MockGatewayFactory {
    pub gateway: Arc<MockGateway>,
    pub quotes: Arc<MockQuoteSource>,
    requested_by: Mutex<Vec<String>>,
}

impl MockGatewayFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client ids passed to `gateway`/`quote_source`, in call order.
    pub fn requested_by(&self) -> Vec<String> {
        self.requested_by.lock().clone()
    }
}

impl GatewayFactory for MockGatewayFactory {
    fn gateway(&self, credentials: &Credentials) -> ClientResult<DynGateway> {
        self.requested_by.lock().push(credentials.client_id.clone());
        Ok(self.gateway.clone())
    }

    fn quote_source(&self, credentials: &Credentials) -> ClientResult<DynQuoteSource> {
        self.requested_by.lock().push(credentials.client_id.clone());
        Ok(self.quotes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_quote_source_filters_and_fails() {
        let quotes = MockQuoteSource::new();
        quotes.set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1500)));
        quotes.fail_segment(ExchangeSegment::BseEq);

        let prices = quotes
            .last_prices(
                ExchangeSegment::NseEq,
                vec!["1333".to_string(), "9".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert!(quotes
            .last_prices(ExchangeSegment::BseEq, vec!["500180".to_string()])
            .await
            .is_err());
        assert_eq!(quotes.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_factory_records_credentials() {
        let factory = MockGatewayFactory::new();
        let creds = Credentials::new("1000001", "t");
        let gateway = factory.gateway(&creds).unwrap();
        factory.quote_source(&creds).unwrap();
        assert_eq!(factory.requested_by(), vec!["1000001", "1000001"]);

        gateway
            .place(PlacementRequest {
                intent: OrderIntent::Bracket(sample_bracket()),
                security_id: "1333".to_string(),
                segment: ExchangeSegment::NseEq,
            })
            .await
            .unwrap();
        assert_eq!(factory.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_gateway_queued_results_first() {
        let gateway = MockGateway::new();
        gateway.push_result(Err(PlacementError::Transport("down".to_string())));
        let request = PlacementRequest {
            intent: OrderIntent::Bracket(sample_bracket()),
            security_id: "1333".to_string(),
            segment: ExchangeSegment::NseEq,
        };
        assert!(gateway.place(request.clone()).await.is_err());
        let ok = gateway.place(request).await.unwrap();
        assert_eq!(ok.order_id, "MOCK-1");
        assert_eq!(gateway.call_count(), 2);
    }

    fn sample_bracket() -> dhan_core::BracketOrderIntent {
        use dhan_core::{ExchangeCode, OrderSide, OrderType, ProductType};
        dhan_core::BracketOrderIntent {
            symbol: "HDFCBANK".to_string(),
            exchange: ExchangeCode::Nse,
            side: OrderSide::Buy,
            quantity: 1,
            order_type: OrderType::Market,
            price: None,
            product: ProductType::Intraday,
            target_price: Price::new(dec!(1600)),
            stop_loss_price: Price::new(dec!(1400)),
            trailing_jump: Price::ZERO,
            tag: None,
            contract: None,
        }
    }
}
