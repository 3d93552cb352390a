//! Deferred trigger queue.
//!
//! Orders wait in the store until the last traded price of their
//! instrument enters `[trigger·(1−tol/100), trigger·(1+tol/100)]`, then go
//! through the orchestrator like any other order. One poller per process.
//!
//! A store error on one record is logged and counted, and the cycle moves
//! on. An outcome that could not be stored is held in memory and retried
//! at the start of each cycle, and its record is not fired again meanwhile.

use crate::config::DeferredConfig;
use crate::error::{DeferredError, DeferredResult};
use dhan_catalog::InstrumentCatalog;
use dhan_client::{DynGatewayFactory, RateLimiter};
use dhan_core::{
    Credentials, ExchangeCode, ExchangeSegment, InstrumentDescriptor, Price, RawOrder, Venue,
};
use dhan_orchestrator::OrderOrchestrator;
use dhan_persistence::{DeferredOrderRecord, DeferredStore};
use dhan_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pending: usize,
    pub segments_queried: usize,
    pub segments_failed: usize,
    pub prices_seen: usize,
    pub placed: usize,
    pub failed: usize,
    /// Per-record store writes that failed this cycle.
    pub store_errors: usize,
}

impl CycleReport {
    pub fn fired(&self) -> usize {
        self.placed + self.failed
    }
}

/// Result of firing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FireOutcome {
    Placed(String),
    Failed(String),
}

struct QueueInner {
    store: Arc<DeferredStore>,
    catalog: InstrumentCatalog,
    factory: DynGatewayFactory,
    limiter: Arc<RateLimiter>,
    default_credentials: Option<Credentials>,
    poll_interval: Duration,
    running: AtomicBool,
    shutdown: CancellationToken,
    /// Fired records whose outcome is not yet in the store.
    unsettled: Mutex<HashMap<String, FireOutcome>>,
}

/// Handle to the deferred queue. Cheap to clone.
#[derive(Clone)]
pub struct DeferredQueue {
    inner: Arc<QueueInner>,
}

impl DeferredQueue {
    /// Create a queue over an opened store.
    ///
    /// # Arguments
    /// * `store` - Durable record store
    /// * `catalog` - Shared catalog used when placing
    /// * `factory` - Builds quote sources and gateways from credentials
    /// * `limiter` - Process-wide rate limiter
    /// * `config` - Poll interval
    /// * `default_credentials` - Used for records stored without their own
    pub fn new(
        store: Arc<DeferredStore>,
        catalog: InstrumentCatalog,
        factory: DynGatewayFactory,
        limiter: Arc<RateLimiter>,
        config: &DeferredConfig,
        default_credentials: Option<Credentials>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                catalog,
                factory,
                limiter,
                default_credentials,
                poll_interval: config.poll_interval(),
                running: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                unsettled: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<DeferredStore> {
        &self.inner.store
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Persist a pending order.
    ///
    /// # Arguments
    /// * `payload` - Order to place once triggered
    /// * `trigger_price` - Band centre, must be positive
    /// * `tolerance_pct` - Band half-width in percent, must not be negative
    /// * `instrument` - Already-resolved instrument
    /// * `credentials` - Session to place with (falls back to the queue default)
    ///
    /// # Returns
    /// Generated record id.
    pub fn enqueue(
        &self,
        payload: RawOrder,
        trigger_price: Price,
        tolerance_pct: Decimal,
        instrument: &InstrumentDescriptor,
        credentials: Option<Credentials>,
    ) -> DeferredResult<String> {
        if !trigger_price.is_positive() {
            return Err(DeferredError::InvalidOrder(format!(
                "trigger price must be positive, got {trigger_price}"
            )));
        }
        if tolerance_pct < Decimal::ZERO {
            return Err(DeferredError::InvalidOrder(format!(
                "tolerance must not be negative, got {tolerance_pct}"
            )));
        }

        let exchange = payload
            .exchange
            .as_deref()
            .and_then(|e| e.parse::<ExchangeCode>().ok())
            .unwrap_or_else(|| exchange_for_venue(instrument.venue));

        let record = DeferredOrderRecord::pending(
            instrument.symbol.clone(),
            exchange,
            instrument.security_id.clone(),
            instrument.segment,
            trigger_price,
            tolerance_pct,
            payload,
            credentials,
        );
        let id = record.id.clone();
        self.inner.store.insert(record)?;
        info!(
            id = %id,
            symbol = %instrument.symbol,
            trigger = %trigger_price,
            tolerance_pct = %tolerance_pct,
            "Deferred order enqueued"
        );
        Ok(id)
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Spawn the polling loop unless it is already running.
    ///
    /// # Returns
    /// Whether this call started it.
    pub fn start(&self) -> bool {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let queue = self.clone();
        tokio::spawn(async move { queue.run().await });
        info!(interval_ms = self.inner.poll_interval.as_millis() as u64, "Deferred poller started");
        true
    }

    /// Stop the polling loop after its current cycle.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval(self.inner.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.poll_once().await {
                Ok(report) if report.fired() > 0 => {
                    info!(placed = report.placed, failed = report.failed, "Deferred orders fired");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Deferred poll cycle failed"),
            }
        }
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Deferred poller stopped");
    }

    /// Run one cycle: fetch prices per segment, update records, fire hits.
    pub async fn poll_once(&self) -> DeferredResult<CycleReport> {
        Metrics::deferred_cycle();
        let mut report = CycleReport::default();
        self.settle_held(&mut report);

        let mut pending = self.inner.store.list_pending();
        {
            let held = self.inner.unsettled.lock();
            pending.retain(|r| !held.contains_key(&r.id));
        }
        report.pending = pending.len();
        if pending.is_empty() {
            return Ok(report);
        }

        let Some(quote_credentials) = self.quote_credentials(&pending) else {
            warn!(pending = pending.len(), "No credentials available for price polling");
            return Ok(report);
        };
        let quotes = match self.inner.factory.quote_source(&quote_credentials) {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(error = %e, "Failed to build quote source");
                return Ok(report);
            }
        };

        let mut by_segment: BTreeMap<ExchangeSegment, Vec<DeferredOrderRecord>> = BTreeMap::new();
        for record in pending {
            by_segment.entry(record.segment).or_default().push(record);
        }

        for (segment, records) in by_segment {
            let mut ids: Vec<String> = records.iter().map(|r| r.security_id.clone()).collect();
            ids.sort();
            ids.dedup();

            report.segments_queried += 1;
            let prices = match quotes.last_prices(segment, ids).await {
                Ok(prices) => prices,
                Err(e) => {
                    report.segments_failed += 1;
                    Metrics::deferred_quote_error(segment.as_str());
                    warn!(segment = %segment, error = %e, "Last price fetch failed, skipping segment");
                    continue;
                }
            };

            for record in records {
                let Some(&price) = prices.get(&record.security_id) else {
                    continue;
                };
                report.prices_seen += 1;
                if let Err(e) = self.inner.store.update_last_price(&record.id, price) {
                    report.store_errors += 1;
                    error!(id = %record.id, error = %e, "Failed to store last price, skipping record");
                    continue;
                }

                if !record.trigger_price.within_band(price, record.tolerance_pct) {
                    debug!(
                        id = %record.id,
                        symbol = %record.symbol,
                        price = %price,
                        trigger = %record.trigger_price,
                        "Outside trigger band"
                    );
                    continue;
                }

                let outcome = self.fire(&record, price).await;
                match &outcome {
                    FireOutcome::Placed(_) => report.placed += 1,
                    FireOutcome::Failed(_) => report.failed += 1,
                }
                if let Err(e) = self.settle(&record.id, &outcome) {
                    report.store_errors += 1;
                    error!(id = %record.id, error = %e, "Failed to store deferred outcome, holding it");
                    self.inner.unsettled.lock().insert(record.id.clone(), outcome);
                }
            }
        }

        Ok(report)
    }

    /// Place a triggered record.
    async fn fire(&self, record: &DeferredOrderRecord, price: Price) -> FireOutcome {
        info!(
            id = %record.id,
            symbol = %record.symbol,
            price = %price,
            trigger = %record.trigger_price,
            "Trigger band hit, placing deferred order"
        );

        let outcome = match self.credentials_for(record) {
            None => Err("no broker credentials for deferred order".to_string()),
            Some(credentials) => match self.inner.factory.gateway(&credentials) {
                Err(e) => Err(e.to_string()),
                Ok(gateway) => {
                    let orchestrator = OrderOrchestrator::new(
                        self.inner.catalog.clone(),
                        gateway,
                        Arc::clone(&self.inner.limiter),
                    );
                    orchestrator
                        .place(&record.payload)
                        .await
                        .map(|placed| placed.order_id)
                        .map_err(|e| e.to_string())
                }
            },
        };

        match outcome {
            Ok(order_id) => {
                Metrics::deferred_trigger(true);
                info!(id = %record.id, order_id = %order_id, "Deferred order placed");
                FireOutcome::Placed(order_id)
            }
            Err(message) => {
                Metrics::deferred_trigger(false);
                warn!(id = %record.id, error = %message, "Deferred order failed");
                FireOutcome::Failed(message)
            }
        }
    }

    fn settle(&self, id: &str, outcome: &FireOutcome) -> DeferredResult<()> {
        match outcome {
            FireOutcome::Placed(order_id) => self.inner.store.mark_placed(id, order_id)?,
            FireOutcome::Failed(message) => self.inner.store.mark_failed(id, message)?,
        };
        Ok(())
    }

    /// Retry storing outcomes held from earlier cycles.
    fn settle_held(&self, report: &mut CycleReport) {
        let held: Vec<(String, FireOutcome)> = self
            .inner
            .unsettled
            .lock()
            .iter()
            .map(|(id, outcome)| (id.clone(), outcome.clone()))
            .collect();
        for (id, outcome) in held {
            match self.settle(&id, &outcome) {
                Ok(()) => {
                    self.inner.unsettled.lock().remove(&id);
                    info!(id = %id, "Held deferred outcome stored");
                }
                Err(e) => {
                    report.store_errors += 1;
                    warn!(id = %id, error = %e, "Held deferred outcome still not stored");
                }
            }
        }
    }

    fn credentials_for(&self, record: &DeferredOrderRecord) -> Option<Credentials> {
        record
            .credentials
            .clone()
            .or_else(|| self.inner.default_credentials.clone())
    }

    /// Queue default, else the first pending record that carries credentials.
    fn quote_credentials(&self, pending: &[DeferredOrderRecord]) -> Option<Credentials> {
        self.inner
            .default_credentials
            .clone()
            .or_else(|| pending.iter().find_map(|r| r.credentials.clone()))
    }
}

fn exchange_for_venue(venue: Venue) -> ExchangeCode {
    match venue {
        Venue::Nse => ExchangeCode::Nse,
        Venue::Bse => ExchangeCode::Bse,
        Venue::Mcx => ExchangeCode::Mcx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhan_catalog::CatalogConfig;
    use dhan_client::{MockGatewayFactory, PlacementError};
    use dhan_persistence::DeferredStatus;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    const MASTER_CSV: &str = "\
EXCH_ID,SEGMENT,SECURITY_ID,ISIN,INSTRUMENT,UNDERLYING_SECURITY_ID,UNDERLYING_SYMBOL,SYMBOL_NAME,DISPLAY_NAME,INSTRUMENT_TYPE,SERIES,LOT_SIZE,SM_EXPIRY_DATE,STRIKE_PRICE,OPTION_TYPE
NSE,E,1333,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,EQ,1.0,0,-0.01000,XX
NSE,E,1594,INE009A01021,EQUITY,,INFY,INFY,Infosys,ES,EQ,1.0,0,-0.01000,XX
BSE,E,500180,INE040A01034,EQUITY,,HDFCBANK,HDFCBANK,HDFC Bank,ES,A,1.0,0,-0.01000,XX
";

    struct Fixture {
        _dir: TempDir,
        catalog: InstrumentCatalog,
        factory: Arc<MockGatewayFactory>,
        queue: DeferredQueue,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let master_path = dir.path().join("master.csv");
        std::fs::write(&master_path, MASTER_CSV).unwrap();
        let catalog = InstrumentCatalog::new(CatalogConfig {
            master_path,
            auto_refresh: false,
            ..Default::default()
        });
        catalog.load_blocking().unwrap();

        let store = Arc::new(DeferredStore::open(dir.path().join("deferred.jsonl"), 100).unwrap());
        let factory = Arc::new(MockGatewayFactory::new());
        let config = DeferredConfig {
            poll_interval_ms: 3_000,
            ..Default::default()
        };
        let queue = DeferredQueue::new(
            store,
            catalog.clone(),
            factory.clone(),
            Arc::new(RateLimiter::per_second(25)),
            &config,
            None,
        );
        Fixture {
            _dir: dir,
            catalog,
            factory,
            queue,
        }
    }

    fn payload(symbol: &str, exchange: &str) -> RawOrder {
        RawOrder {
            symbol: Some(symbol.to_string()),
            exchange: Some(exchange.to_string()),
            side: Some("BUY".to_string()),
            quantity: Some(1),
            order_type: Some("LIMIT".to_string()),
            product: Some("CNC".to_string()),
            price: Some(dec!(1500)),
            trigger_price: Some(dec!(1495)),
            ..Default::default()
        }
    }

    fn creds() -> Option<Credentials> {
        Some(Credentials::new("1000001", "token"))
    }

    fn enqueue(f: &Fixture, symbol: &str, venue: Venue, trigger: Decimal) -> String {
        let instrument = f.catalog.lookup_on_exchange(symbol, venue).unwrap().unwrap();
        let exchange = exchange_for_venue(venue).to_string();
        f.queue
            .enqueue(
                payload(symbol, &exchange),
                Price::new(trigger),
                dec!(0.5),
                &instrument,
                creds(),
            )
            .unwrap()
    }

    #[test]
    fn test_enqueue_rejects_bad_inputs() {
        let f = fixture();
        let instrument = f.catalog.lookup_by_symbol("INFY").unwrap().unwrap();
        let zero = f.queue.enqueue(
            payload("INFY", "NSE"),
            Price::ZERO,
            dec!(0.5),
            &instrument,
            creds(),
        );
        assert!(matches!(zero, Err(DeferredError::InvalidOrder(_))));
        let negative = f.queue.enqueue(
            payload("INFY", "NSE"),
            Price::new(dec!(100)),
            dec!(-1),
            &instrument,
            creds(),
        );
        assert!(matches!(negative, Err(DeferredError::InvalidOrder(_))));
        assert!(f.queue.store().is_empty());
    }

    #[tokio::test]
    async fn test_poll_fires_only_inside_band() {
        let f = fixture();
        let hit = enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));
        let miss = enqueue(&f, "INFY", Venue::Nse, dec!(1800));

        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1504)));
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1594", Price::new(dec!(1700)));

        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.pending, 2);
        assert_eq!(report.segments_queried, 1);
        assert_eq!(report.placed, 1);
        assert_eq!(report.failed, 0);

        let store = f.queue.store();
        let placed = store.get(&hit).unwrap();
        assert_eq!(placed.status, DeferredStatus::Placed);
        assert_eq!(placed.order_id.as_deref(), Some("MOCK-1"));
        let waiting = store.get(&miss).unwrap();
        assert_eq!(waiting.status, DeferredStatus::Pending);
        assert_eq!(waiting.last_price, Some(Price::new(dec!(1700))));

        // One batched quote call for both NSE_EQ ids.
        let calls = f.factory.quotes.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len(), 2);
        assert_eq!(f.factory.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_placed_records_never_fire_twice() {
        let f = fixture();
        enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1500)));

        f.queue.poll_once().await.unwrap();
        let second = f.queue.poll_once().await.unwrap();
        assert_eq!(second.pending, 0);
        assert_eq!(f.factory.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_segment_skips_only_its_records() {
        let f = fixture();
        let nse = enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));
        let bse = enqueue(&f, "HDFCBANK", Venue::Bse, dec!(1500));

        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1500)));
        f.factory.quotes.fail_segment(ExchangeSegment::BseEq);

        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.segments_queried, 2);
        assert_eq!(report.segments_failed, 1);
        assert_eq!(report.placed, 1);

        assert_eq!(f.queue.store().get(&nse).unwrap().status, DeferredStatus::Placed);
        let untouched = f.queue.store().get(&bse).unwrap();
        assert_eq!(untouched.status, DeferredStatus::Pending);
        assert!(untouched.last_price.is_none());
    }

    #[tokio::test]
    async fn test_store_error_skips_only_that_record() {
        let f = fixture();
        let a = enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));
        let b = enqueue(&f, "INFY", Venue::Nse, dec!(1700));
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1500)));
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1594", Price::new(dec!(1700)));

        // First write of the cycle fails; the other record still fires.
        f.queue.store().fail_appends(0, 1);
        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.prices_seen, 2);
        assert_eq!(report.store_errors, 1);
        assert_eq!(report.placed, 1);
        assert_eq!(f.factory.gateway.call_count(), 1);

        let statuses = [a.as_str(), b.as_str()]
            .map(|id| f.queue.store().get(id).unwrap().status);
        assert!(statuses.contains(&DeferredStatus::Placed));
        assert!(statuses.contains(&DeferredStatus::Pending));

        // The skipped record is picked up next cycle.
        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.store_errors, 0);
        assert_eq!(report.placed, 1);
        assert!(f.queue.store().list_pending().is_empty());
    }

    #[tokio::test]
    async fn test_unstored_outcome_is_held_not_refired() {
        let f = fixture();
        let id = enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1500)));

        // Last price is stored, the placed status is not (twice).
        f.queue.store().fail_appends(1, 2);
        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.placed, 1);
        assert_eq!(report.store_errors, 1);
        assert_eq!(f.queue.store().get(&id).unwrap().status, DeferredStatus::Pending);

        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.pending, 0);
        assert_eq!(report.store_errors, 1);

        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.store_errors, 0);
        let placed = f.queue.store().get(&id).unwrap();
        assert_eq!(placed.status, DeferredStatus::Placed);
        assert_eq!(placed.order_id.as_deref(), Some("MOCK-1"));
        assert_eq!(f.factory.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_broker_rejection_marks_failed() {
        let f = fixture();
        let id = enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1500)));
        f.factory.gateway.push_result(Err(PlacementError::BrokerRejected {
            code: "DH-906".to_string(),
            message: "order not allowed".to_string(),
            order_id: None,
        }));

        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.failed, 1);

        let failed = f.queue.store().get(&id).unwrap();
        assert_eq!(failed.status, DeferredStatus::Failed);
        assert!(failed.error.unwrap().contains("order not allowed"));
    }

    #[tokio::test]
    async fn test_invalid_payload_marks_failed_without_network() {
        let f = fixture();
        let instrument = f.catalog.lookup_by_symbol("INFY").unwrap().unwrap();
        let bad = RawOrder {
            quantity: Some(0),
            ..payload("INFY", "NSE")
        };
        let id = f
            .queue
            .enqueue(bad, Price::new(dec!(1700)), dec!(1), &instrument, creds())
            .unwrap();
        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1594", Price::new(dec!(1700)));

        let report = f.queue.poll_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(f.queue.store().get(&id).unwrap().status, DeferredStatus::Failed);
        assert_eq!(f.factory.gateway.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_loop_polls() {
        let f = fixture();
        let id = enqueue(&f, "HDFCBANK", Venue::Nse, dec!(1500));

        assert!(f.queue.start());
        assert!(!f.queue.start());
        assert!(f.queue.is_running());

        // First tick runs immediately; price not yet in band.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.queue.store().get(&id).unwrap().status, DeferredStatus::Pending);

        f.factory
            .quotes
            .set_price(ExchangeSegment::NseEq, "1333", Price::new(dec!(1501)));
        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(f.queue.store().get(&id).unwrap().status, DeferredStatus::Placed);

        f.queue.shutdown();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!f.queue.is_running());
    }
}
