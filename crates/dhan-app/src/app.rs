//! Application wiring.
//!
//! One catalog, one rate limiter and one gateway factory per process. The
//! orchestrator, bulk processor and deferred queue are all built on them.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use dhan_bulk::{BulkError, BulkJob, BulkProcessor, BulkRow};
use dhan_catalog::{CatalogError, CatalogStats, InstrumentCatalog, MasterRefresher};
use dhan_client::{DynGatewayFactory, HttpGatewayFactory, RateLimiter};
use dhan_core::{PlacementResult, Price, RawOrder};
use dhan_deferred::DeferredQueue;
use dhan_orchestrator::{check_exchange, check_lot_size, OrderError, OrderOrchestrator};
use dhan_persistence::DeferredStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Session name used for jobs started from this process.
pub const LOCAL_SESSION: &str = "local";

const BULK_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct Application {
    config: AppConfig,
    catalog: InstrumentCatalog,
    limiter: Arc<RateLimiter>,
    factory: DynGatewayFactory,
    bulk: BulkProcessor,
}

impl Application {
    /// Wire the application against the live broker API.
    pub fn new(config: AppConfig) -> Self {
        let factory: DynGatewayFactory = Arc::new(HttpGatewayFactory::new(config.client_config()));
        Self::with_factory(config, factory)
    }

    /// Wire the application with a custom gateway factory.
    pub fn with_factory(config: AppConfig, factory: DynGatewayFactory) -> Self {
        let catalog = InstrumentCatalog::new(config.catalog.clone());
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let bulk = BulkProcessor::new(catalog.clone(), Arc::clone(&factory), Arc::clone(&limiter));
        Self {
            config,
            catalog,
            limiter,
            factory,
            bulk,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    /// Download the master regardless of age, then reload indexes.
    pub async fn refresh_instruments(&self) -> AppResult<CatalogStats> {
        let catalog = &self.config.catalog;
        let refresher = MasterRefresher::new(
            catalog.source_url.clone(),
            catalog.master_path.clone(),
            Duration::from_secs(catalog.download_timeout_secs),
        )?;
        refresher.refresh().await?;

        let loader = self.catalog.clone();
        let stats = tokio::task::spawn_blocking(move || loader.load_blocking())
            .await
            .map_err(task_failed)??;
        Ok(stats)
    }

    /// Orchestrator for the configured operator session.
    pub fn orchestrator(&self) -> AppResult<OrderOrchestrator> {
        let credentials = self.config.credentials().ok_or(AppError::MissingCredentials)?;
        let gateway = self.factory.gateway(&credentials)?;
        Ok(OrderOrchestrator::new(
            self.catalog.clone(),
            gateway,
            Arc::clone(&self.limiter),
        ))
    }

    /// Place one order.
    pub async fn place(&self, raw: &RawOrder) -> AppResult<PlacementResult> {
        Ok(self.orchestrator()?.place(raw).await?)
    }

    /// The process-wide bulk processor. Session rules hold across callers.
    pub fn bulk_processor(&self) -> &BulkProcessor {
        &self.bulk
    }

    /// Run a bulk job to completion.
    pub async fn run_bulk(&self, rows: Vec<BulkRow>) -> AppResult<BulkJob> {
        let credentials = self.config.credentials().ok_or(AppError::MissingCredentials)?;
        let job_id = self.bulk.submit(LOCAL_SESSION, credentials, rows)?;
        info!(job_id = %job_id, "Bulk job submitted");

        self.bulk
            .wait(&job_id, BULK_POLL_INTERVAL)
            .await
            .ok_or_else(|| BulkError::UnknownJob(job_id).into())
    }

    /// Open the deferred store and build the queue.
    pub fn deferred_queue(&self) -> AppResult<DeferredQueue> {
        let deferred = &self.config.deferred;
        if let Some(parent) = deferred.store_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Arc::new(DeferredStore::open(
            &deferred.store_path,
            deferred.compact_threshold,
        )?);
        Ok(DeferredQueue::new(
            store,
            self.catalog.clone(),
            Arc::clone(&self.factory),
            Arc::clone(&self.limiter),
            deferred,
            self.config.credentials(),
        ))
    }

    /// Validate and resolve the order, then park it in the deferred queue.
    pub async fn enqueue_deferred(
        &self,
        queue: &DeferredQueue,
        payload: RawOrder,
        trigger_price: Price,
        tolerance_pct: Decimal,
    ) -> AppResult<String> {
        self.catalog.ensure_loaded().await?;

        // Reject what could never be placed before it sits in the queue.
        let intent = dhan_validator::validate(&payload).map_err(OrderError::from)?;
        let exchange = intent.exchange();
        let instrument = self
            .catalog
            .resolve(intent.symbol(), intent.contract().copied(), exchange.base_venue())
            .await?
            .ok_or_else(|| OrderError::InstrumentNotFound {
                symbol: intent.symbol().to_string(),
                exchange: exchange.to_string(),
            })?;
        check_exchange(exchange, &instrument)?;
        check_lot_size(intent.quantity(), &instrument)?;

        Ok(queue.enqueue(payload, trigger_price, tolerance_pct, &instrument, None)?)
    }

    /// Run the deferred poller until Ctrl-C.
    pub async fn run_deferred(&self) -> AppResult<()> {
        let queue = self.deferred_queue()?;
        info!(pending = queue.store().list_pending().len(), "Deferred queue opened");
        queue.start();

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        queue.shutdown();
        Ok(())
    }
}

fn task_failed(e: tokio::task::JoinError) -> AppError {
    CatalogError::Task(e.to_string()).into()
}
