//! Bulk order submission.
//!
//! Tabular rows are turned into orders and placed by a background worker
//! per job, sharing the process rate limiter with interactive placement.
//! Jobs report per-row outcomes and stage timings and can be cancelled
//! between rows.

pub mod error;
pub mod job;
pub mod processor;
pub mod row;

pub use error::{BulkError, BulkResult};
pub use job::{BulkJob, BulkJobStatus, RowOutcome, RowTiming, TimingStats};
pub use processor::BulkProcessor;
pub use row::{canonical_field, gate_row, normalize_header, rows_from_csv, BulkRow, CellError};
