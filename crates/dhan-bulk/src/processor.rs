//! Bulk job processor.
//!
//! One worker task per job. The worker owns the job record; readers take
//! snapshots under its mutex. Cancellation is cooperative: the token is
//! checked before each row and again right before the broker call, and an
//! in-flight call always completes and is recorded.

use crate::error::{BulkError, BulkResult};
use crate::job::{BulkJob, BulkJobStatus, RowOutcome, RowTiming};
use crate::row::{gate_row, BulkRow};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dhan_catalog::InstrumentCatalog;
use dhan_client::{DynGatewayFactory, RateLimiter};
use dhan_core::Credentials;
use dhan_orchestrator::OrderOrchestrator;
use dhan_telemetry::Metrics;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct JobEntry {
    job: Arc<Mutex<BulkJob>>,
    token: CancellationToken,
}

impl JobEntry {
    /// Snapshot with `Cancelling` reported between cancel and worker exit.
    fn snapshot(&self) -> BulkJob {
        let mut job = self.job.lock().clone();
        if self.token.is_cancelled() && !job.status.is_terminal() {
            job.status = BulkJobStatus::Cancelling;
        }
        job
    }
}

struct ProcessorInner {
    catalog: InstrumentCatalog,
    factory: DynGatewayFactory,
    limiter: Arc<RateLimiter>,
    jobs: DashMap<String, JobEntry>,
    /// Session → its latest job id.
    sessions: DashMap<String, String>,
}

/// Runs bulk jobs. Cheap to clone.
#[derive(Clone)]
pub struct BulkProcessor {
    inner: Arc<ProcessorInner>,
}

impl BulkProcessor {
    /// Create a processor.
    ///
    /// # Arguments
    /// * `catalog` - Shared instrument catalog
    /// * `factory` - Builds one gateway per job
    /// * `limiter` - Process-wide rate limiter
    pub fn new(
        catalog: InstrumentCatalog,
        factory: DynGatewayFactory,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                catalog,
                factory,
                limiter,
                jobs: DashMap::new(),
                sessions: DashMap::new(),
            }),
        }
    }

    /// Start a job for `session`.
    ///
    /// The session's previous job, if finished, is dropped.
    ///
    /// # Returns
    /// The new job id, or `JobActive` while the session's last job is
    /// still pending, running or cancelling.
    pub fn submit(
        &self,
        session: &str,
        credentials: Credentials,
        rows: Vec<BulkRow>,
    ) -> BulkResult<String> {
        if rows.is_empty() {
            return Err(BulkError::EmptyInput);
        }
        let gateway = self.inner.factory.gateway(&credentials)?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let job = Arc::new(Mutex::new(BulkJob::new(
            job_id.clone(),
            session.to_string(),
            rows.len(),
        )));
        let token = CancellationToken::new();

        // The session entry stays locked until the new job is registered.
        match self.inner.sessions.entry(session.to_string()) {
            Entry::Occupied(mut slot) => {
                let previous = slot.get().clone();
                if let Some(status) = self.status(&previous).map(|j| j.status) {
                    if !status.is_terminal() {
                        return Err(BulkError::JobActive {
                            session: session.to_string(),
                            job_id: previous,
                        });
                    }
                }
                self.inner.jobs.remove(&previous);
                self.register(&job_id, &job, &token);
                slot.insert(job_id.clone());
            }
            Entry::Vacant(slot) => {
                self.register(&job_id, &job, &token);
                slot.insert(job_id.clone());
            }
        }

        let worker = Worker {
            job,
            token,
            catalog: self.inner.catalog.clone(),
            orchestrator: OrderOrchestrator::new(
                self.inner.catalog.clone(),
                gateway,
                Arc::clone(&self.inner.limiter),
            ),
            rows,
        };
        tokio::spawn(worker.run());

        Ok(job_id)
    }

    fn register(&self, job_id: &str, job: &Arc<Mutex<BulkJob>>, token: &CancellationToken) {
        self.inner.jobs.insert(
            job_id.to_string(),
            JobEntry {
                job: Arc::clone(job),
                token: token.clone(),
            },
        );
    }

    /// Consistent snapshot of a job.
    pub fn status(&self, job_id: &str) -> Option<BulkJob> {
        self.inner.jobs.get(job_id).map(|entry| entry.snapshot())
    }

    /// Snapshot of the session's latest job.
    pub fn latest_for(&self, session: &str) -> Option<BulkJob> {
        let job_id = self.inner.sessions.get(session)?.clone();
        self.status(&job_id)
    }

    /// Request cancellation.
    ///
    /// # Returns
    /// The status a reader sees right after the call.
    pub fn cancel(&self, job_id: &str) -> BulkResult<BulkJobStatus> {
        let entry = self
            .inner
            .jobs
            .get(job_id)
            .ok_or_else(|| BulkError::UnknownJob(job_id.to_string()))?;
        let status = entry.job.lock().status;
        if status.is_terminal() {
            return Ok(status);
        }
        entry.token.cancel();
        info!(job_id, "Bulk job cancellation requested");
        Ok(BulkJobStatus::Cancelling)
    }

    /// Poll until the job is terminal.
    ///
    /// # Returns
    /// Final snapshot, or `None` if the job is unknown or was superseded.
    pub async fn wait(&self, job_id: &str, poll_interval: Duration) -> Option<BulkJob> {
        loop {
            let job = self.status(job_id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    job: Arc<Mutex<BulkJob>>,
    token: CancellationToken,
    catalog: InstrumentCatalog,
    orchestrator: OrderOrchestrator,
    rows: Vec<BulkRow>,
}

impl Worker {
    async fn run(self) {
        let job_id = {
            let mut job = self.job.lock();
            job.status = BulkJobStatus::Running;
            job.id.clone()
        };
        Metrics::bulk_job_started();
        info!(job_id = %job_id, rows = self.rows.len(), "Bulk job started");

        if let Err(message) = self.warm_catalog().await {
            error!(job_id = %job_id, error = %message, "Bulk job failed to load instruments");
            let mut job = self.job.lock();
            job.error = Some(format!("Instrument catalog unavailable: {message}"));
            job.finish(BulkJobStatus::Failed);
            Metrics::bulk_job_finished();
            return;
        }

        let mut cancelled = false;
        for row in &self.rows {
            if self.token.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.process_row(row).await {
                Some((outcome, timing)) => {
                    debug!(
                        job_id = %job_id,
                        row = outcome.row,
                        success = outcome.success,
                        message = %outcome.message,
                        "Bulk row processed"
                    );
                    Metrics::bulk_row(outcome.success);
                    self.job.lock().record(outcome, timing);
                }
                None => {
                    cancelled = true;
                    break;
                }
            }
        }

        let mut job = self.job.lock();
        if cancelled {
            job.finish(BulkJobStatus::Cancelled);
            warn!(
                job_id = %job_id,
                processed = job.processed(),
                total = job.total_rows,
                "Bulk job cancelled"
            );
        } else {
            job.finish(BulkJobStatus::Completed);
            info!(
                job_id = %job_id,
                success = job.success_count,
                failed = job.failure_count,
                avg_row_ms = job.timing.avg_row_ms,
                "Bulk job completed"
            );
        }
        Metrics::bulk_job_finished();
    }

    /// Load the catalog and prefetch every symbol in one pass.
    async fn warm_catalog(&self) -> Result<(), String> {
        self.catalog
            .ensure_loaded()
            .await
            .map_err(|e| e.to_string())?;

        let symbols: Vec<String> = self
            .rows
            .iter()
            .filter_map(|r| r.symbol().map(str::to_string))
            .collect();
        let catalog = self.catalog.clone();
        let cached = tokio::task::spawn_blocking(move || catalog.prefetch(&symbols))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        debug!(cached, "Bulk symbols prefetched");
        Ok(())
    }

    /// Process one row.
    ///
    /// # Returns
    /// `None` when cancellation was observed before the broker call.
    async fn process_row(&self, row: &BulkRow) -> Option<(RowOutcome, RowTiming)> {
        let started = Instant::now();
        let mut timing = RowTiming::default();
        let outcome = self.place_row(row, &mut timing).await?;
        timing.total = started.elapsed();
        Some((outcome, timing))
    }

    async fn place_row(&self, row: &BulkRow, timing: &mut RowTiming) -> Option<RowOutcome> {
        let number = row.row_number;
        let symbol = row.symbol().map(str::to_string);

        let raw = match row.to_raw_order() {
            Ok(raw) => raw,
            Err(errors) => {
                let message = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Some(RowOutcome::failed(number, symbol, message));
            }
        };
        if let Err(message) = gate_row(&raw) {
            return Some(RowOutcome::failed(number, symbol, message));
        }

        let build_started = Instant::now();
        let prepared = self.orchestrator.prepare(&raw).await;
        timing.build = build_started.elapsed();
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Some(RowOutcome::failed(number, symbol, e.to_string())),
        };

        timing.rate_wait = self.orchestrator.throttle().await;
        if self.token.is_cancelled() {
            return None;
        }

        let api_started = Instant::now();
        let result = self.orchestrator.submit(&prepared).await;
        timing.api = api_started.elapsed();

        Some(match result {
            Ok(placed) => RowOutcome::placed(number, symbol, placed.order_id),
            Err(e) => RowOutcome::failed(number, symbol, e.to_string())
                .with_order_id(e.order_id().map(str::to_string)),
        })
    }
}
