//! Bulk job record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkJobStatus {
    Pending,
    Running,
    /// Cancel requested; the worker has not stopped yet.
    Cancelling,
    Cancelled,
    Completed,
    Failed,
}

impl BulkJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for BulkJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Result of one processed row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowOutcome {
    pub row: usize,
    pub symbol: Option<String>,
    pub success: bool,
    pub message: String,
    pub order_id: Option<String>,
}

impl RowOutcome {
    pub fn placed(row: usize, symbol: Option<String>, order_id: String) -> Self {
        Self {
            row,
            symbol,
            success: true,
            message: "Order placed successfully".to_string(),
            order_id: Some(order_id),
        }
    }

    pub fn failed(row: usize, symbol: Option<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            symbol,
            success: false,
            message: message.into(),
            order_id: None,
        }
    }

    /// Failed row that still got a broker order id.
    pub fn with_order_id(mut self, order_id: Option<String>) -> Self {
        self.order_id = order_id;
        self
    }
}

/// Stage timings for one row. Stages a row never reached stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowTiming {
    pub build: Duration,
    pub rate_wait: Duration,
    pub api: Duration,
    pub total: Duration,
}

/// Accumulated timings in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingStats {
    pub rows: u64,
    pub build_ms: f64,
    pub rate_wait_ms: f64,
    pub api_ms: f64,
    pub total_ms: f64,
    pub avg_build_ms: f64,
    pub avg_rate_wait_ms: f64,
    pub avg_api_ms: f64,
    pub avg_row_ms: f64,
}

impl TimingStats {
    pub fn record(&mut self, timing: RowTiming) {
        self.rows += 1;
        self.build_ms += millis(timing.build);
        self.rate_wait_ms += millis(timing.rate_wait);
        self.api_ms += millis(timing.api);
        self.total_ms += millis(timing.total);

        let n = self.rows as f64;
        self.avg_build_ms = self.build_ms / n;
        self.avg_rate_wait_ms = self.rate_wait_ms / n;
        self.avg_api_ms = self.api_ms / n;
        self.avg_row_ms = self.total_ms / n;
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Snapshot-able state of one bulk job. Written only by its worker.
#[derive(Debug, Clone, Serialize)]
pub struct BulkJob {
    pub id: String,
    pub session: String,
    pub status: BulkJobStatus,
    pub total_rows: usize,
    pub results: Vec<RowOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
    pub timing: TimingStats,
    /// Job-level failure reason.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    pub fn new(id: String, session: String, total_rows: usize) -> Self {
        Self {
            id,
            session,
            status: BulkJobStatus::Pending,
            total_rows,
            results: Vec::with_capacity(total_rows),
            success_count: 0,
            failure_count: 0,
            timing: TimingStats::default(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, outcome: RowOutcome, timing: RowTiming) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.results.push(outcome);
        self.timing.record(timing);
    }

    pub fn processed(&self) -> usize {
        self.results.len()
    }

    pub fn finish(&mut self, status: BulkJobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}
