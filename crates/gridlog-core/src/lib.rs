//! gridlog-core - Core library for Gridlog
//!
//! Offline-first capture for utility-meter field work: durable local
//! queues for readings and photos, remote record/blob gateways, and the
//! drain state machine that reconciles temporary identifiers once the
//! remote store accepts a record.

pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod service;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Reading, TempId};
pub use service::SyncService;
pub use state::SyncState;
