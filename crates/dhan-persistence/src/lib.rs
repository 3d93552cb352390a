//! Durable storage for deferred trigger orders.
//!
//! Records live in a JSON Lines append log: every mutation appends the
//! full record, and replay keeps the last line per id.

pub mod error;
pub mod record;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use record::{truncate_error, DeferredOrderRecord, DeferredStatus, MAX_ERROR_CHARS};
pub use store::{DeferredStore, DEFAULT_COMPACT_THRESHOLD};
