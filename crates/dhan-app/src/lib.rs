//! Dhan order bridge application.
//!
//! Wires the shared services for the CLI:
//! - Instrument catalog and master refresh
//! - Single-order placement
//! - Bulk CSV jobs
//! - Deferred trigger poller

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, LOCAL_SESSION};
pub use config::{AppConfig, CredentialsConfig};
pub use error::{AppError, AppResult};
