//! Deferred trigger queue.
//!
//! Conditional orders are stored durably and placed once the instrument's
//! last traded price enters the trigger band. A single background poller
//! batches price requests per exchange segment.

pub mod config;
pub mod error;
pub mod queue;

pub use config::DeferredConfig;
pub use error::{DeferredError, DeferredResult};
pub use queue::{CycleReport, DeferredQueue};
