//! Single-order placement pipeline.
//!
//! `place` = `prepare` (validate, resolve, exchange and lot checks; no
//! network) + `throttle` (shared rate limiter) + `submit` (gateway call).
//! The stages are public so the bulk processor can time each one and
//! check for cancellation between them.

use crate::error::{OrderError, OrderResult};
use dhan_catalog::InstrumentCatalog;
use dhan_client::{DynGateway, PlacementRequest, RateLimiter};
use dhan_core::{ExchangeCode, InstrumentDescriptor, OrderIntent, PlacementResult, RawOrder};
use dhan_telemetry::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Validated intent bound to its resolved instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOrder {
    pub intent: OrderIntent,
    pub instrument: InstrumentDescriptor,
}

impl PreparedOrder {
    /// Wire request: resolved security id and the instrument's own segment.
    pub fn request(&self) -> PlacementRequest {
        PlacementRequest {
            intent: self.intent.clone(),
            security_id: self.instrument.security_id.clone(),
            segment: self.instrument.segment,
        }
    }
}

/// Places orders for one broker session.
#[derive(Clone)]
pub struct OrderOrchestrator {
    catalog: InstrumentCatalog,
    gateway: DynGateway,
    limiter: Arc<RateLimiter>,
}

impl OrderOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Arguments
    /// * `catalog` - Shared instrument catalog
    /// * `gateway` - This worker's own gateway
    /// * `limiter` - Process-wide rate limiter
    pub fn new(catalog: InstrumentCatalog, gateway: DynGateway, limiter: Arc<RateLimiter>) -> Self {
        Self {
            catalog,
            gateway,
            limiter,
        }
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    /// Validate and place one order.
    pub async fn place(&self, raw: &RawOrder) -> OrderResult<PlacementResult> {
        let prepared = self.prepare(raw).await?;
        self.throttle().await;
        self.submit(&prepared).await
    }

    /// Validate, resolve and check an order without touching the network.
    pub async fn prepare(&self, raw: &RawOrder) -> OrderResult<PreparedOrder> {
        let result = self.prepare_inner(raw).await;
        if let Err(e) = &result {
            let kind = dhan_validator::resolve_kind(raw)
                .map(|k| k.as_str())
                .unwrap_or("unknown");
            debug!(error = %e, kind, "Order rejected before placement");
            Metrics::order_failed(kind, e.label());
        }
        result
    }

    async fn prepare_inner(&self, raw: &RawOrder) -> OrderResult<PreparedOrder> {
        self.catalog.ensure_loaded().await?;

        let intent = dhan_validator::validate(raw)?;
        let requested = intent.exchange();

        let instrument = self
            .catalog
            .resolve(
                intent.symbol(),
                intent.contract().copied(),
                requested.base_venue(),
            )
            .await?
            .ok_or_else(|| OrderError::InstrumentNotFound {
                symbol: intent.symbol().to_string(),
                exchange: requested.to_string(),
            })?;

        check_exchange(requested, &instrument)?;
        check_lot_size(intent.quantity(), &instrument)?;

        debug!(
            symbol = %instrument.symbol,
            security_id = %instrument.security_id,
            segment = %instrument.segment,
            kind = %intent.kind(),
            "Order prepared"
        );
        Ok(PreparedOrder { intent, instrument })
    }

    /// Wait for a rate limiter slot.
    ///
    /// # Returns
    /// Time spent waiting.
    pub async fn throttle(&self) -> Duration {
        let waited = self.limiter.acquire().await;
        Metrics::rate_limit_wait(waited.as_secs_f64() * 1000.0);
        waited
    }

    /// Send a prepared order to the broker.
    ///
    /// Callers must `throttle` first.
    pub async fn submit(&self, prepared: &PreparedOrder) -> OrderResult<PlacementResult> {
        let kind = prepared.intent.kind().as_str();
        let started = Instant::now();
        let result = self.gateway.place(prepared.request()).await;
        Metrics::broker_latency(kind, started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(placed) => {
                Metrics::order_placed(kind);
                info!(
                    symbol = %prepared.instrument.symbol,
                    order_id = %placed.order_id,
                    status = %placed.status,
                    kind,
                    "Order placed"
                );
                Ok(placed)
            }
            Err(e) => {
                let err = OrderError::from(e);
                Metrics::order_failed(kind, err.label());
                warn!(
                    symbol = %prepared.instrument.symbol,
                    error = %err,
                    order_id = ?err.order_id(),
                    kind,
                    "Order placement failed"
                );
                Err(err)
            }
        }
    }
}

/// The requested exchange code must map to the instrument's venue, and an
/// F&O code only fits a derivative.
pub fn check_exchange(requested: ExchangeCode, instrument: &InstrumentDescriptor) -> OrderResult<()> {
    let expected = requested.base_venue();
    if instrument.venue != expected {
        return Err(OrderError::ExchangeMismatch(format!(
            "{} is listed on {}, not {}",
            instrument.symbol, instrument.venue, requested
        )));
    }
    if requested.is_derivative_code() && !instrument.is_derivative() {
        return Err(OrderError::ExchangeMismatch(format!(
            "{} is not a derivative but was sent to {}",
            instrument.symbol, requested
        )));
    }
    Ok(())
}

/// Derivative quantities must be whole lots.
pub fn check_lot_size(quantity: u32, instrument: &InstrumentDescriptor) -> OrderResult<()> {
    if instrument.is_derivative() && quantity % instrument.lot_size != 0 {
        return Err(OrderError::LotSizeViolation {
            symbol: instrument.symbol.clone(),
            quantity,
            lot_size: instrument.lot_size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhan_core::{ExchangeSegment, Venue};

    fn instrument(
        venue: Venue,
        segment: ExchangeSegment,
        derivative: bool,
        lot: u32,
    ) -> InstrumentDescriptor {
        InstrumentDescriptor {
            symbol: "TEST".to_string(),
            security_id: "1".to_string(),
            venue,
            segment,
            lot_size: lot,
            instrument_type: String::new(),
            display_name: None,
            isin: None,
            expiry: derivative.then(|| "2025-01-30".parse().unwrap()),
            strike: None,
            option_type: None,
            underlying: None,
        }
    }

    #[test]
    fn test_check_exchange_table() {
        let nse_eq = instrument(Venue::Nse, ExchangeSegment::NseEq, false, 1);
        assert!(check_exchange(ExchangeCode::Nse, &nse_eq).is_ok());
        assert!(check_exchange(ExchangeCode::Bse, &nse_eq).is_err());
        // F&O code on a cash instrument.
        assert!(check_exchange(ExchangeCode::Nfo, &nse_eq).is_err());

        let bse_fut = instrument(Venue::Bse, ExchangeSegment::BseFno, true, 20);
        assert!(check_exchange(ExchangeCode::Bfo, &bse_fut).is_ok());
        assert!(check_exchange(ExchangeCode::BseFno, &bse_fut).is_ok());
        assert!(check_exchange(ExchangeCode::Bse, &bse_fut).is_ok());
        assert!(check_exchange(ExchangeCode::NseFno, &bse_fut).is_err());
    }

    #[test]
    fn test_check_lot_size() {
        let fut = instrument(Venue::Nse, ExchangeSegment::NseFno, true, 50);
        assert!(check_lot_size(100, &fut).is_ok());
        assert!(matches!(
            check_lot_size(25, &fut),
            Err(OrderError::LotSizeViolation { lot_size: 50, .. })
        ));

        // Cash instruments ignore lot size.
        let eq = instrument(Venue::Nse, ExchangeSegment::NseEq, false, 5);
        assert!(check_lot_size(3, &eq).is_ok());
    }
}
